/// Approximate matching used by the scorer.
///
/// Two cheap tolerance mechanisms for Russian morphology and typos:
/// suffix-stripped containment, and a banded Levenshtein check that bails out
/// as soon as the distance bound is exceeded.

/// Inflectional endings tried when building token variants, longest first.
const SUFFIXES: &[&str] = &[
    "ами", "ями", "его", "ого", "ему", "ому", "ыми", "ими",
    "ых", "их", "ой", "ей", "ый", "ий", "ая", "ое", "ую", "ею",
    "ам", "ям", "ах", "ях", "ов", "ев", "ом", "ем", "ым", "им",
    "а", "я", "ы", "и", "у", "ю", "о", "е", "ё", "й", "ь",
];

/// Remaining stem must keep at least this many characters.
const MIN_STEM_CHARS: usize = 3;

/// The lowercased token plus every suffix-stripped stem.
pub fn token_variants(token: &str) -> Vec<String> {
    let t = token.to_lowercase();
    if t.is_empty() {
        return Vec::new();
    }
    let len = t.chars().count();
    let mut variants = vec![t.clone()];
    for suffix in SUFFIXES {
        if let Some(stem) = t.strip_suffix(suffix) {
            if len - suffix.chars().count() >= MIN_STEM_CHARS && !variants.iter().any(|v| v == stem) {
                variants.push(stem.to_string());
            }
        }
    }
    variants
}

/// True if any variant of `token` occurs in `haystack` (case-insensitive).
pub fn approx_contains(haystack: &str, token: &str) -> bool {
    if haystack.is_empty() || token.is_empty() {
        return false;
    }
    let h = haystack.to_lowercase();
    token_variants(token).iter().any(|v| h.contains(v.as_str()))
}

/// True iff Levenshtein(a, b) <= max_dist.
///
/// Only cells within `max_dist` of the diagonal are computed; the scan stops
/// as soon as a whole row exceeds the bound.
pub fn within_edit_distance(a: &str, b: &str, max_dist: usize) -> bool {
    if a == b {
        return true;
    }
    let mut a: Vec<char> = a.chars().collect();
    let mut b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max_dist {
        return false;
    }
    if a.len() > b.len() {
        std::mem::swap(&mut a, &mut b);
    }
    let la = a.len();
    if la == 0 {
        return b.len() <= max_dist;
    }
    let out_of_band = max_dist + 1;

    let mut prev: Vec<usize> = (0..=la).collect();
    let mut row = vec![0usize; la + 1];
    for (j, &bj) in b.iter().enumerate() {
        let j = j + 1;
        let start = j.saturating_sub(max_dist).max(1);
        let end = (j + max_dist).min(la);
        if start > end {
            return false;
        }
        row[0] = j;
        for cell in row.iter_mut().take(start).skip(1) {
            *cell = out_of_band;
        }
        for i in start..=end {
            let cost = usize::from(a[i - 1] != bj);
            row[i] = (prev[i] + 1).min(row[i - 1] + 1).min(prev[i - 1] + cost);
        }
        for cell in row.iter_mut().skip(end + 1) {
            *cell = out_of_band;
        }
        std::mem::swap(&mut prev, &mut row);
        if prev.iter().all(|&d| d > max_dist) {
            return false;
        }
    }
    prev[la] <= max_dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_contains_suffix_stripped() {
        // "графами" contains "граф" directly; stems of the token also match
        assert!(approx_contains("графами", "граф"));
        assert!(approx_contains("Алгоритм Дейкстра", "дейкстры"));
        assert!(approx_contains("Остовные деревья", "остовное"));
    }

    #[test]
    fn test_approx_contains_rejects_short_stems() {
        // stripping "а" from "она" would leave "он" (< 3 chars)
        assert_eq!(token_variants("она"), vec!["она".to_string()]);
        assert!(!approx_contains("он", "она"));
    }

    #[test]
    fn test_approx_contains_empty_inputs() {
        assert!(!approx_contains("", "граф"));
        assert!(!approx_contains("граф", ""));
    }

    #[test]
    fn test_token_variants_lowercases() {
        let variants = token_variants("Деревья");
        assert_eq!(variants[0], "деревья");
        assert!(variants.contains(&"деревь".to_string()));
    }

    #[test]
    fn test_within_edit_distance_substitution() {
        assert!(within_edit_distance("алгоритм", "алгоритн", 1));
    }

    #[test]
    fn test_within_edit_distance_insert_delete() {
        assert!(within_edit_distance("дейкстра", "дейкстры", 1));
        assert!(within_edit_distance("kruskal", "kruskall", 1));
        assert!(within_edit_distance("kruskall", "kruskal", 1));
    }

    #[test]
    fn test_within_edit_distance_rejects() {
        assert!(!within_edit_distance("дейкстра", "флойд", 1));
        assert!(!within_edit_distance("abcdef", "abcxyz", 2));
        assert!(within_edit_distance("abcdef", "abcxyf", 2));
    }

    #[test]
    fn test_within_edit_distance_length_gap() {
        assert!(!within_edit_distance("граф", "графами", 1));
        assert!(within_edit_distance("", "", 0));
        assert!(within_edit_distance("a", "", 1));
    }
}
