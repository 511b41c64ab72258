/// Composite relevance scoring for pool candidates
///
/// The final score is an additive combination of the raw vector similarity and
/// a set of lexical and structural signals:
///   1. Term evidence: substring counts, title/source token hits
///   2. Tolerant matches: suffix-stripped title hits, edit-distance-1 hits
///   3. Phrase evidence: derived phrases (or the whole query) in title/text
///   4. Intent evidence: canonical source, algorithm name, definition markers
///   5. Mode bonuses: see `ScoringMode`
///
/// Signal extraction is shared by every mode; modes only decide which phrase
/// set is matched and which bonuses enter the sum. All scoring is pure.

use std::collections::HashSet;

use crate::config::ScoringWeights;
use crate::index::RawHit;
use crate::query::approx::{approx_contains, within_edit_distance};
use crate::query::tokens::text_words;
use crate::query::FeatureSet;

use super::{truncate_chars, Candidate, DisplayPayload, Signals};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which bonus table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Search results: properties, lemma/theorem and focus-term bonuses.
    Search,
    /// RAG pool: payload-provided semantic flags.
    Rag,
    /// RAG candidates added by pool expansion: like `Rag`, but phrase evidence
    /// is the whole trimmed query instead of the derived phrase set.
    LegacyExpansion,
}

/// Low-value wiki sections that dilute algorithm answers.
const BOILERPLATE_MARKERS: &[&str] = &[
    "источники информации",
    "см. также",
    "категория:",
    "== реализация ==",
    "== корректность ==",
    "== идея ==",
    "== оценка производительности ==",
];

const DEFINITION_TEXT_MARKERS: &[&str] = &["определен", "definition"];
const DEF_LIKE_MARKERS: &[&str] = &[" — алгоритм", " это алгоритм"];
const PROPERTIES_MARKER: &str = "основные свойства";
const LEMMA_THEOREM_MARKERS: &[&str] = &["лемма", "теорема"];

/// How candidate text is picked and trimmed for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOptions {
    /// Use only `chunk_text` instead of `text` with `chunk_text` fallback
    pub with_chunk_text: bool,
    /// Display text is cut to this many characters; `None` or 0 keeps it whole
    pub display_chars: Option<usize>,
}

/// Scores hits against one request's features.
pub struct Scorer<'a> {
    weights: &'a ScoringWeights,
    features: &'a FeatureSet,
    fuzzy_text_word_limit: usize,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn capped(count: usize, cap: usize) -> f64 {
    count.min(cap) as f64
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Number of query tokens within `max_dist` edits of some word in `words`.
fn fuzzy_hits(tokens: &[String], words: &HashSet<&str>, min_len: usize, max_dist: usize) -> usize {
    tokens
        .iter()
        .filter(|t| t.chars().count() >= min_len)
        .filter(|t| words.iter().any(|w| within_edit_distance(t, w, max_dist)))
        .count()
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

impl<'a> Scorer<'a> {
    pub fn new(weights: &'a ScoringWeights, features: &'a FeatureSet, fuzzy_text_word_limit: usize) -> Self {
        Scorer {
            weights,
            features,
            fuzzy_text_word_limit,
        }
    }

    /// Score one hit. Deterministic for fixed weights, features and payload.
    pub fn score(&self, hit: &RawHit, mode: ScoringMode, opts: TextOptions) -> Candidate {
        let body = hit.body(opts.with_chunk_text);
        let signals = self.extract_signals(hit, &body.to_lowercase(), mode);
        let score = self.weighted_sum(hit, &signals, mode);

        let text = match opts.display_chars {
            Some(n) if n > 0 => truncate_chars(body, n),
            _ => body,
        };

        Candidate {
            id: hit.id.clone(),
            score,
            vector_score: hit.vector_score,
            signals,
            display: DisplayPayload {
                title: hit.title.clone(),
                source: hit.source.clone(),
                chunk_index: hit.chunk_index,
                text: text.to_string(),
            },
            stitched: None,
        }
    }

    /// Signal extraction shared by all modes.
    pub fn extract_signals(&self, hit: &RawHit, text_lower: &str, mode: ScoringMode) -> Signals {
        let fs = self.features;
        let w = self.weights;
        let tokens = &fs.tokens;
        let title_lower = hit.title.to_lowercase();
        let source_lower = hit.source.to_lowercase();

        let lex_matches = tokens.iter().map(|t| text_lower.matches(t.as_str()).count()).sum();
        let title_match = tokens.iter().any(|t| title_lower.contains(t.as_str()));
        let all_tokens_in_title = !tokens.is_empty() && tokens.iter().all(|t| title_lower.contains(t.as_str()));
        let approx_title_hits = tokens.iter().filter(|t| approx_contains(&title_lower, t)).count();

        let (phrase_in_title, phrase_in_text) = match mode {
            ScoringMode::Search | ScoringMode::Rag => (
                fs.phrases.iter().any(|p| title_lower.contains(p.as_str())),
                fs.phrases.iter().any(|p| text_lower.contains(p.as_str())),
            ),
            ScoringMode::LegacyExpansion => {
                let phrase = fs.phrase_lower.as_str();
                (
                    !phrase.is_empty() && title_lower.contains(phrase),
                    !phrase.is_empty() && text_lower.contains(phrase),
                )
            }
        };

        let (fuzzy_title_hits, fuzzy_text_hits) = if tokens.is_empty() {
            (0, 0)
        } else {
            let title_words: HashSet<&str> = text_words(&title_lower).collect();
            let body_words: HashSet<&str> = text_words(text_lower).take(self.fuzzy_text_word_limit).collect();
            (
                fuzzy_hits(tokens, &title_words, w.fuzzy_min_token_len, w.fuzzy_max_distance),
                fuzzy_hits(tokens, &body_words, w.fuzzy_min_token_len, w.fuzzy_max_distance),
            )
        };

        let source_match = tokens.iter().any(|t| source_lower.contains(t.as_str()));
        let exact_source_match = fs.expected_source.as_deref() == Some(hit.source.as_str());
        let algo_name_match = fs
            .title_focus_token
            .as_deref()
            .is_some_and(|focus| approx_contains(&title_lower, focus));
        let def_boost = fs.is_definitional
            && (contains_any(text_lower, DEFINITION_TEXT_MARKERS) || contains_any(&title_lower, DEFINITION_TEXT_MARKERS));
        let def_like = fs.is_algorithm_query && contains_any(text_lower, DEF_LIKE_MARKERS);
        let has_properties = text_lower.contains(PROPERTIES_MARKER) || title_lower.contains(PROPERTIES_MARKER);
        let has_lemma_theorem = contains_any(text_lower, LEMMA_THEOREM_MARKERS);
        let barycenter_focus = fs
            .focus_tokens(w.focus_token_min_len)
            .any(|t| title_lower.contains(t) || source_lower.contains(t));
        let boilerplate = contains_any(text_lower, BOILERPLATE_MARKERS);

        let algo_name_payload_match = match (fs.title_focus_token.as_deref(), hit.algorithm_name.as_deref()) {
            (Some(focus), Some(name)) if !name.is_empty() => approx_contains(name, focus),
            _ => false,
        };

        Signals {
            lex_matches,
            title_match,
            source_match,
            exact_source_match,
            approx_title_hits,
            fuzzy_title_hits,
            fuzzy_text_hits,
            phrase_in_title,
            phrase_in_text,
            all_tokens_in_title,
            algo_name_match,
            def_boost,
            def_like,
            has_properties,
            has_lemma_theorem,
            barycenter_focus,
            boilerplate,
            is_definition_flag: hit.is_definition,
            is_algorithm_flag: hit.is_algorithm,
            has_math_flag: hit.has_math,
            algo_name_payload_match,
        }
    }

    /// Weighted sum of the signals for `mode`.
    pub fn weighted_sum(&self, hit: &RawHit, s: &Signals, mode: ScoringMode) -> f64 {
        let w = self.weights;
        let fs = self.features;
        let algo = fs.is_algorithm_query;

        let mut score = hit.vector_score * w.w_vector
            + w.w_lex_match * capped(s.lex_matches, w.lex_match_cap)
            + w.w_title_match * indicator(s.title_match)
            + w.w_source_match * indicator(s.source_match)
            + w.w_approx_title_hits * capped(s.approx_title_hits, w.approx_title_hits_cap)
            + w.w_fuzzy_title_hits * capped(s.fuzzy_title_hits, w.fuzzy_title_hits_cap)
            + w.w_fuzzy_text_hits * capped(s.fuzzy_text_hits, w.fuzzy_text_hits_cap)
            // max of two indicators, never their sum
            + w.w_title_phrase * indicator(s.phrase_in_title || s.all_tokens_in_title)
            + w.w_text_phrase * indicator(s.phrase_in_text)
            + w.w_algo_name_match * indicator(s.algo_name_match)
            + w.w_def_boost * indicator(s.def_boost)
            + w.w_exact_source_match * indicator(s.exact_source_match)
            + w.w_def_like * indicator(s.def_like);

        match mode {
            ScoringMode::Search => {
                score += w.w_has_properties * indicator(s.has_properties)
                    + w.w_has_lemma_theorem * indicator(s.has_lemma_theorem)
                    + w.w_barycenter_focus * indicator(s.barycenter_focus);
                if fs.focus_tokens(w.focus_token_min_len).next().is_some() {
                    if s.barycenter_focus {
                        score += w.barycenter_focus_bonus;
                    } else {
                        score -= w.barycenter_miss_penalty;
                    }
                }
            }
            ScoringMode::Rag | ScoringMode::LegacyExpansion => {
                score += w.w_is_definition_flag * indicator(fs.is_definitional && s.is_definition_flag)
                    + w.w_has_math_flag * indicator(algo && s.has_math_flag)
                    + w.w_algo_name_payload_match * indicator(s.algo_name_payload_match)
                    + w.w_is_algorithm_flag * indicator(algo && s.is_algorithm_flag);
            }
        }

        if algo && s.boilerplate {
            score += w.w_boilerplate_penalty;
        }
        if algo && hit.chunk_index <= w.early_chunk_index {
            score += w.w_early_chunk_bonus;
        }
        score
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
