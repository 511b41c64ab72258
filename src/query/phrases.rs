/// Multi-word phrase derivation and canonical-source guessing.
///
/// The corpus names every document after its wiki page title:
/// `Просмотр_исходного_текста_страницы_<Capitalized_Words>.tex`. Guesses built
/// here are only retrieval hints; a wrong guess costs one filtered probe.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::PhraseConfig;
use super::tokens::extract_tokens;

/// Filename prefix shared by every source document.
pub const SOURCE_PREFIX: &str = "Просмотр_исходного_текста_страницы_";

/// Longest phrase (in words) that is ever returned.
const MAX_PHRASE_WORDS: usize = 4;
const MAX_PHRASES: usize = 2;
/// Words of at least this many chars rank a phrase higher.
const LONG_WORD_CHARS: usize = 5;

/// Captures the name following the "algorithm" marker, e.g. "алгоритм Прима".
static ALGORITHM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)алгоритм\s+([A-Za-zА-Яа-яЁё\-]+)").expect("valid algorithm-name regex")
});

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The word right after the "algorithm" marker, as written in the query.
pub fn algorithm_name(query: &str) -> Option<String> {
    let caps = ALGORITHM_NAME_RE.captures(query)?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Canonical page of the named algorithm: `..._Алгоритм_<Name>.tex`.
pub fn expected_source_for_query(query: &str) -> Option<String> {
    let name = algorithm_name(query)?;
    Some(format!("{}Алгоритм_{}.tex", SOURCE_PREFIX, capitalize(&name)))
}

/// Page whose title is the text itself (1..=4 words, each capitalized).
pub fn expected_source_for_title(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || !text.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || words.len() > MAX_PHRASE_WORDS {
        return None;
    }
    let joined = words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join("_");
    Some(format!("{}{}.tex", SOURCE_PREFIX, joined))
}

/// Rank key: (distinct long words, phrase length in chars)
fn phrase_rank(phrase: &str) -> (usize, usize) {
    let distinct: HashSet<&str> = phrase.split_whitespace().collect();
    let long_words = distinct
        .iter()
        .filter(|w| w.chars().count() >= LONG_WORD_CHARS)
        .count();
    (long_words, phrase.chars().count())
}

/// Up to two ranked n-grams (2..=max_ngram words) over the query tokens.
///
/// Falls back to single long tokens when no n-gram qualifies.
pub fn derive_phrases(query: &str, cfg: &PhraseConfig) -> Vec<String> {
    let tokens = extract_tokens(query.trim());
    if tokens.is_empty() {
        return Vec::new();
    }
    let extra_stopwords: HashSet<String> = cfg
        .extra_stopwords
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut phrases: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for n in 2..=cfg.max_ngram.min(MAX_PHRASE_WORDS) {
        if tokens.len() < n {
            break;
        }
        for gram in tokens.windows(n) {
            if gram.iter().any(|t| extra_stopwords.contains(t)) {
                continue;
            }
            let phrase = gram.join(" ");
            if phrase.chars().count() < cfg.min_len || seen.contains(&phrase) {
                continue;
            }
            seen.insert(phrase.clone());
            phrases.push(phrase);
        }
    }

    if phrases.is_empty() {
        for token in &tokens {
            if token.chars().count() >= cfg.min_len
                && !extra_stopwords.contains(token)
                && seen.insert(token.clone())
            {
                phrases.push(token.clone());
            }
            if phrases.len() >= MAX_PHRASES {
                break;
            }
        }
    }

    // stable: equal ranks keep generation order
    phrases.sort_by(|a, b| phrase_rank(b).cmp(&phrase_rank(a)));
    phrases.truncate(MAX_PHRASES);
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_phrases_mst() {
        let cfg = PhraseConfig::default();
        let phrases = derive_phrases("минимальное остовное дерево", &cfg);
        assert!(phrases.len() <= 2);
        for p in &phrases {
            assert!(p.split_whitespace().count() <= 4);
            assert!(p.chars().count() >= cfg.min_len);
        }
        // the trigram has three long words and ranks first
        assert_eq!(phrases[0], "минимальное остовное дерево");
        assert_eq!(phrases[1], "минимальное остовное");
    }

    #[test]
    fn test_derive_phrases_single_token_fallback() {
        let cfg = PhraseConfig::default();
        assert_eq!(derive_phrases("алгоритм Дейкстры", &cfg), vec!["дейкстры".to_string()]);
    }

    #[test]
    fn test_derive_phrases_extra_stopwords() {
        let cfg = PhraseConfig {
            extra_stopwords: vec!["Дерево".to_string()],
            ..PhraseConfig::default()
        };
        let phrases = derive_phrases("минимальное остовное дерево", &cfg);
        assert_eq!(phrases, vec!["минимальное остовное".to_string()]);
    }

    #[test]
    fn test_derive_phrases_empty() {
        assert!(derive_phrases("", &PhraseConfig::default()).is_empty());
        assert!(derive_phrases("что это", &PhraseConfig::default()).is_empty());
    }

    #[test]
    fn test_expected_source_for_query() {
        assert_eq!(
            expected_source_for_query("алгоритм дейкстры").as_deref(),
            Some("Просмотр_исходного_текста_страницы_Алгоритм_Дейкстры.tex")
        );
        assert_eq!(
            expected_source_for_query("Как работает АЛГОРИТМ Флойда-Уоршелла?").as_deref(),
            Some("Просмотр_исходного_текста_страницы_Алгоритм_Флойда-Уоршелла.tex")
        );
        assert!(expected_source_for_query("остовное дерево").is_none());
    }

    #[test]
    fn test_expected_source_for_title() {
        assert_eq!(
            expected_source_for_title("остовное дерево").as_deref(),
            Some("Просмотр_исходного_текста_страницы_Остовное_Дерево.tex")
        );
        assert_eq!(
            expected_source_for_title("красно-черное дерево").as_deref(),
            Some("Просмотр_исходного_текста_страницы_Красно_Черное_Дерево.tex")
        );
        assert!(expected_source_for_title("один два три четыре пять").is_none());
        assert!(expected_source_for_title("12 34").is_none());
        assert!(expected_source_for_title("   ").is_none());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("дейкстры"), "Дейкстры");
        assert_eq!(capitalize(""), "");
    }
}
