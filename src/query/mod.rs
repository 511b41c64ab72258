/// Query feature extraction
///
/// Turns a raw query into the immutable `FeatureSet` that every later stage
/// reads: normalized tokens, ranked phrases, intent flags and the ordered list
/// of canonical-source guesses used for probe injection.

pub mod approx;
pub mod phrases;
pub mod tokens;

use crate::config::PhraseConfig;

/// Substrings marking a "what is X" style query.
pub const DEFINITION_MARKERS: &[&str] = &["что такое", "определен", "definition", "определи"];

/// Substring marking an algorithm query.
pub const ALGORITHM_MARKER: &str = "алгоритм";

/// Upper bound on source guesses: one canonical + one query title + two phrase titles.
const MAX_SOURCE_GUESSES: usize = 4;

pub fn is_definition_query(query: &str) -> bool {
    let q = query.to_lowercase();
    DEFINITION_MARKERS.iter().any(|m| q.contains(m))
}

/// Everything derived from the query text. Computed once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub tokens: Vec<String>,
    pub phrases: Vec<String>,
    pub is_definitional: bool,
    pub is_algorithm_query: bool,
    /// Name following the algorithm marker, capitalized ("Дейкстры")
    pub title_focus_token: Option<String>,
    /// Canonical page of the named algorithm; drives `exact_source_match`
    pub expected_source: Option<String>,
    /// Ordered, deduplicated probe targets: canonical guess first, then title guesses
    pub source_guesses: Vec<String>,
    /// Trimmed lowercased query, matched verbatim by the legacy expansion scorer
    pub phrase_lower: String,
}

impl FeatureSet {
    pub fn extract(query: &str, cfg: &PhraseConfig) -> Self {
        let tokens = tokens::extract_tokens(query);
        let derived = phrases::derive_phrases(query, cfg);
        let expected_source = phrases::expected_source_for_query(query);

        let mut source_guesses: Vec<String> = Vec::new();
        let title_guesses = std::iter::once(query)
            .chain(derived.iter().map(String::as_str))
            .filter_map(phrases::expected_source_for_title);
        for guess in expected_source.clone().into_iter().chain(title_guesses) {
            if source_guesses.len() >= MAX_SOURCE_GUESSES {
                break;
            }
            if !source_guesses.contains(&guess) {
                source_guesses.push(guess);
            }
        }

        FeatureSet {
            tokens,
            phrases: derived,
            is_definitional: is_definition_query(query),
            is_algorithm_query: query.to_lowercase().contains(ALGORITHM_MARKER),
            title_focus_token: phrases::algorithm_name(query).map(|n| phrases::capitalize(&n)),
            expected_source,
            source_guesses,
            phrase_lower: query.trim().to_lowercase(),
        }
    }

    /// Query tokens long enough to act as a document's focus term.
    pub fn focus_tokens(&self, min_len: usize) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .map(String::as_str)
            .filter(move |t| t.chars().count() >= min_len)
    }
}
