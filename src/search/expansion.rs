/// Adaptive pool expansion
///
/// When no scored candidate carries a term hit, the primary similarity search
/// is repeated with a larger limit and the new points are scored with the
/// legacy whole-query phrase matcher. Expansion is best effort: a failed
/// re-fetch leaves the pool as it was.

use std::collections::HashSet;

use crate::index::{into_hits, with_timeout, PointId, VectorIndex};

use super::scoring::{Scorer, ScoringMode, TextOptions};
use super::{has_strong_signal, Candidate};

/// Sizing of one expansion attempt.
#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimits {
    pub internal_limit: usize,
    pub internal_max: usize,
    pub cap: usize,
    pub min_step: usize,
}

impl ExpansionLimits {
    /// min(cap, max(2 * limit, limit + step, internal_max)), or `None` when
    /// that would not grow the fetch.
    pub fn extra_limit(&self) -> Option<usize> {
        let il = self.internal_limit;
        let extra = (il * 2)
            .max(il + self.min_step)
            .max(self.internal_max)
            .min(self.cap);
        (extra > il).then_some(extra)
    }
}

/// Diagnostics of one expansion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpansionOutcome {
    pub expanded: bool,
    pub pool_size: usize,
}

/// Expand `pool` in place if it has no strong signal.
#[allow(clippy::too_many_arguments)]
pub async fn expand_if_weak(
    index: &dyn VectorIndex,
    collection: &str,
    vector: &[f32],
    pool: &mut Vec<Candidate>,
    scorer: &Scorer<'_>,
    opts: TextOptions,
    limits: ExpansionLimits,
    timeout_secs: u64,
) -> ExpansionOutcome {
    let unchanged = ExpansionOutcome {
        expanded: false,
        pool_size: pool.len(),
    };
    if has_strong_signal(pool) {
        return unchanged;
    }
    let Some(extra_limit) = limits.extra_limit() else {
        return unchanged;
    };

    let points = match with_timeout(timeout_secs, index.search(collection, vector, extra_limit, None)).await {
        Ok(points) => points,
        Err(e) => {
            tracing::warn!(extra_limit = extra_limit, error = %e, "Expansion fetch failed, keeping current pool");
            return unchanged;
        }
    };

    let mut seen: HashSet<PointId> = pool.iter().map(|c| c.id.clone()).collect();
    let before = pool.len();
    for hit in into_hits(points) {
        if seen.insert(hit.id.clone()) {
            pool.push(scorer.score(&hit, ScoringMode::LegacyExpansion, opts));
        }
    }

    tracing::debug!(
        extra_limit = extra_limit,
        pool_before = before,
        pool_size = pool.len(),
        "Pool expanded"
    );

    ExpansionOutcome {
        expanded: true,
        pool_size: pool.len(),
    }
}
