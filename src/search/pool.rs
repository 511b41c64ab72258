/// Candidate pool assembly
///
/// One primary similarity search plus a bounded set of source-filtered probes,
/// one per canonical-source guess. Probes run concurrently; their results are
/// merged in probe order so the pool does not depend on completion order.
/// A failed or slow probe only costs its own contribution.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::index::{into_hits, with_timeout, IndexError, PointFilter, PointId, RawHit, VectorIndex};

/// Parameters of one pool fetch.
#[derive(Debug, Clone)]
pub struct PoolRequest {
    pub collection: String,
    pub vector: Arc<[f32]>,
    pub internal_limit: usize,
    /// Per-probe result limit
    pub probe_limit: usize,
    /// Canonical guess first, then title guesses
    pub source_guesses: Vec<String>,
    pub primary_timeout_secs: u64,
    pub aux_timeout_secs: u64,
}

/// Hits of the assembled pool, unique by id, primary results first.
#[derive(Debug, Clone, Default)]
pub struct FetchedPool {
    pub hits: Vec<RawHit>,
    pub primary_count: usize,
    pub injected_count: usize,
}

/// Append hits whose id has not been seen yet. Returns how many were added.
pub fn merge_new(pool: &mut Vec<RawHit>, seen: &mut HashSet<PointId>, hits: Vec<RawHit>) -> usize {
    let before = pool.len();
    for hit in hits {
        if seen.insert(hit.id.clone()) {
            pool.push(hit);
        }
    }
    pool.len() - before
}

/// Fetch the pool. Only a primary failure is an error.
pub async fn fetch_pool(index: Arc<dyn VectorIndex>, req: PoolRequest) -> Result<FetchedPool, IndexError> {
    let primary = with_timeout(
        req.primary_timeout_secs,
        index.search(&req.collection, &req.vector, req.internal_limit, None),
    )
    .await?;

    let mut seen: HashSet<PointId> = HashSet::new();
    let mut hits = Vec::new();
    let primary_count = merge_new(&mut hits, &mut seen, into_hits(primary));

    // dropping the set aborts probes still in flight
    let mut probes = JoinSet::new();
    for (order, guess) in req.source_guesses.iter().enumerate() {
        let index = Arc::clone(&index);
        let collection = req.collection.clone();
        let vector = Arc::clone(&req.vector);
        let filter = PointFilter::source(guess.clone());
        let (limit, secs) = (req.probe_limit, req.aux_timeout_secs);
        probes.spawn(async move {
            let result = with_timeout(secs, index.search(&collection, &vector, limit, Some(&filter))).await;
            (order, filter, result)
        });
    }

    let mut results: Vec<Option<Vec<RawHit>>> = vec![None; req.source_guesses.len()];
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((order, _, Ok(points))) => {
                let mut probe_hits = into_hits(points);
                probe_hits.truncate(req.probe_limit);
                results[order] = Some(probe_hits);
            }
            Ok((_, filter, Err(e))) => {
                tracing::warn!(source = ?filter.source, error = %e, "Source probe failed, continuing without it");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Source probe task failed");
            }
        }
    }

    let mut injected_count = 0;
    for probe_hits in results.into_iter().flatten() {
        injected_count += merge_new(&mut hits, &mut seen, probe_hits);
    }

    tracing::debug!(
        primary = primary_count,
        injected = injected_count,
        probes = req.source_guesses.len(),
        "Candidate pool assembled"
    );

    Ok(FetchedPool {
        hits,
        primary_count,
        injected_count,
    })
}
