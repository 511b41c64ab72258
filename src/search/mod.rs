pub mod context;
pub mod diversify;
pub mod expansion;
pub mod pool;
pub mod scoring;
pub mod stitch;

// Re-export key types for convenience
pub use scoring::{Scorer, ScoringMode};

use serde::Serialize;

use crate::index::PointId;

/// Lexical and structural evidence extracted for one candidate.
///
/// Counts are stored uncapped; caps apply only when weighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Signals {
    pub lex_matches: usize,
    pub title_match: bool,
    pub source_match: bool,
    pub exact_source_match: bool,
    pub approx_title_hits: usize,
    pub fuzzy_title_hits: usize,
    pub fuzzy_text_hits: usize,
    pub phrase_in_title: bool,
    pub phrase_in_text: bool,
    pub all_tokens_in_title: bool,
    pub algo_name_match: bool,
    pub def_boost: bool,
    pub def_like: bool,
    pub has_properties: bool,
    pub has_lemma_theorem: bool,
    pub barycenter_focus: bool,
    pub boilerplate: bool,
    pub is_definition_flag: bool,
    pub is_algorithm_flag: bool,
    pub has_math_flag: bool,
    pub algo_name_payload_match: bool,
}

impl Signals {
    /// Any exact, approximate or fuzzy lexical match to the query.
    pub fn has_term_hit(&self) -> bool {
        self.phrase_in_title
            || self.phrase_in_text
            || self.lex_matches >= 1
            || self.approx_title_hits >= 1
            || self.fuzzy_title_hits >= 1
            || self.fuzzy_text_hits >= 1
    }
}

/// What the caller sees of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub title: String,
    pub source: String,
    pub chunk_index: u64,
    pub text: String,
}

/// Diagnostics attached to a hit whose text was replaced by a neighbor window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StitchInfo {
    pub stitched_count: usize,
    pub stitched_range: [u64; 2],
}

/// A scored pool entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: PointId,
    pub score: f64,
    pub vector_score: f64,
    pub signals: Signals,
    pub display: DisplayPayload,
    pub stitched: Option<StitchInfo>,
}

/// Per-candidate debug output: every signal plus the inputs and result of the sum.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub vector_score: f64,
    #[serde(flatten)]
    pub signals: Signals,
    pub final_score: f64,
    #[serde(flatten)]
    pub stitched: Option<StitchInfo>,
}

impl Candidate {
    pub fn has_term_hit(&self) -> bool {
        self.signals.has_term_hit()
    }

    pub fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            vector_score: self.vector_score,
            signals: self.signals.clone(),
            final_score: self.score,
            stitched: self.stitched.clone(),
        }
    }
}

/// True if any candidate carries a term hit; drives adaptive expansion.
pub fn has_strong_signal(candidates: &[Candidate]) -> bool {
    candidates.iter().any(Candidate::has_term_hit)
}

/// Sort by score descending. Stable: equal scores keep their pool order.
pub fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
