/// Maximal marginal relevance selection
///
/// Greedy: each step takes the remaining candidate maximizing
/// `lambda * score - (1 - lambda) * max_jaccard(selected)`. Token sets are
/// computed once per candidate. Selection state is a boolean mask over the
/// input slice, so candidates are never removed from a list while iterating.

use std::collections::HashSet;

use super::Candidate;

/// Jaccard index of two token sets; 0.0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Select up to `limit` candidates from `candidates` (sorted by score
/// descending). Ties go to the earlier candidate.
///
/// When `forced_top` is given and not among the selection, it is prepended
/// and the result truncated back to `limit`.
pub fn diversify<F>(
    candidates: &[Candidate],
    limit: usize,
    lambda: f64,
    tokenize: F,
    forced_top: Option<&Candidate>,
) -> Vec<Candidate>
where
    F: Fn(&Candidate) -> HashSet<String>,
{
    let token_sets: Vec<HashSet<String>> = candidates.iter().map(&tokenize).collect();
    let mut taken = vec![false; candidates.len()];
    let mut order: Vec<usize> = Vec::with_capacity(limit.min(candidates.len()));

    while order.len() < limit {
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let value = if order.is_empty() {
                candidate.score
            } else {
                let redundancy = order
                    .iter()
                    .map(|&j| jaccard(&token_sets[i], &token_sets[j]))
                    .fold(0.0, f64::max);
                lambda * candidate.score - (1.0 - lambda) * redundancy
            };
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((i, value));
            }
        }
        match best {
            Some((i, _)) => {
                taken[i] = true;
                order.push(i);
            }
            None => break,
        }
    }

    let mut selected: Vec<Candidate> = order.into_iter().map(|i| candidates[i].clone()).collect();
    if let Some(top) = forced_top {
        if !selected.iter().any(|c| c.id == top.id) {
            selected.insert(0, top.clone());
            selected.truncate(limit);
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PointId;
    use crate::query::tokens::token_set;
    use crate::search::test_support::candidate;

    fn by_text(c: &Candidate) -> HashSet<String> {
        token_set(&c.display.text)
    }

    fn ids(selected: &[Candidate]) -> Vec<PointId> {
        selected.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_lambda_one_is_top_k() {
        let pool = vec![
            candidate(1, 0.9, "остовное дерево графа"),
            candidate(2, 0.8, "остовное дерево графа"),
            candidate(3, 0.7, "поток сети"),
            candidate(4, 0.6, "поток сети"),
        ];
        let selected = diversify(&pool, 3, 1.0, by_text, None);
        assert_eq!(ids(&selected), vec![PointId::Num(1), PointId::Num(2), PointId::Num(3)]);
    }

    #[test]
    fn test_redundant_candidate_skipped() {
        let pool = vec![
            candidate(1, 0.9, "остовное дерево графа"),
            candidate(2, 0.85, "остовное дерево графа"),
            candidate(3, 0.7, "максимальный поток сети"),
        ];
        let selected = diversify(&pool, 2, 0.5, by_text, None);
        assert_eq!(ids(&selected), vec![PointId::Num(1), PointId::Num(3)]);
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let pool = vec![candidate(1, 0.5, "граф"), candidate(2, 0.5, "граф"), candidate(3, 0.5, "граф")];
        let selected = diversify(&pool, 1, 0.7, by_text, None);
        assert_eq!(ids(&selected), vec![PointId::Num(1)]);
    }

    #[test]
    fn test_limit_and_exhaustion() {
        let pool = vec![candidate(1, 0.5, "граф"), candidate(2, 0.4, "дерево")];
        assert_eq!(diversify(&pool, 5, 0.7, by_text, None).len(), 2);
        assert!(diversify(&pool, 0, 0.7, by_text, None).is_empty());
        assert!(diversify(&[], 3, 0.7, by_text, None).is_empty());
    }

    #[test]
    fn test_forced_top_prepended_once() {
        let pool = vec![candidate(1, 0.9, "граф"), candidate(2, 0.8, "дерево")];
        let pinned = candidate(7, 0.1, "поток");
        let selected = diversify(&pool, 2, 1.0, by_text, Some(&pinned));
        assert_eq!(ids(&selected), vec![PointId::Num(7), PointId::Num(1)]);

        // already selected: unchanged
        let selected = diversify(&pool, 2, 1.0, by_text, Some(&pool[0]));
        assert_eq!(ids(&selected), vec![PointId::Num(1), PointId::Num(2)]);
    }

    #[test]
    fn test_jaccard() {
        let a = token_set("остовное дерево");
        let b = token_set("остовное дерево графа");
        assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }
}
