/// Query and chunk tokenization.
///
/// A word is a maximal run of Latin letters, Cyrillic letters (including Ё/ё)
/// or ASCII digits. Query tokens are additionally lowercased, length-filtered,
/// stopword-filtered and deduplicated in first-seen order.

use std::collections::HashSet;

/// Inflections of "algorithm" carry no retrieval signal in this corpus.
pub const STOPWORDS: &[&str] = &[
    "алгоритм",
    "алгоритма",
    "алгоритмы",
    "алгоритмов",
    "algorithm",
];

/// Tokens shorter than this (in characters) are dropped.
pub const MIN_TOKEN_CHARS: usize = 4;

pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, 'А'..='я' | 'Ё' | 'ё')
}

/// Split text into words without any normalization.
pub fn text_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Ordered, deduplicated set of normalized query tokens.
pub fn extract_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tokens = Vec::new();
    for word in text_words(&lower) {
        if word.chars().count() < MIN_TOKEN_CHARS || is_stopword(word) {
            continue;
        }
        if seen.insert(word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}

/// Token set of a chunk, used as the MMR similarity basis.
pub fn token_set(text: &str) -> HashSet<String> {
    extract_tokens(text).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tokens_dedup_and_min_length() {
        let tokens = extract_tokens("Что такое граф граф");
        assert_eq!(tokens.iter().filter(|t| *t == "граф").count(), 1);
        // "что" has 3 chars
        assert!(!tokens.contains(&"что".to_string()));
        assert_eq!(tokens, vec!["такое".to_string(), "граф".to_string()]);
    }

    #[test]
    fn test_extract_tokens_drops_stopwords() {
        let tokens = extract_tokens("Алгоритм Дейкстры и algorithm Prim");
        assert_eq!(tokens, vec!["дейкстры".to_string(), "prim".to_string()]);
    }

    #[test]
    fn test_extract_tokens_keeps_first_seen_order() {
        let tokens = extract_tokens("остовное дерево минимальное ОСТОВНОЕ");
        assert_eq!(tokens, vec!["остовное", "дерево", "минимальное"]);
    }

    #[test]
    fn test_text_words_splits_on_punctuation() {
        let words: Vec<&str> = text_words("a-b, Ёлка;x2 ").collect();
        assert_eq!(words, vec!["a", "b", "Ёлка", "x2"]);
    }

    #[test]
    fn test_extract_tokens_empty() {
        assert!(extract_tokens("").is_empty());
        assert!(extract_tokens("   ... ").is_empty());
    }
}
