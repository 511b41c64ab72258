/// Neighbor stitching
///
/// Replaces a hit's display text with the concatenation of the chunks around
/// it from the same source, in chunk order. Each hit is stitched on its own:
/// a failed or empty window fetch leaves that hit exactly as it was.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::index::{into_hits, with_timeout, IndexError, PointFilter, RawHit, VectorIndex};

use super::{truncate_chars, Candidate, StitchInfo};

const PIECE_SEPARATOR: &str = "\n\n";

/// Window shape and fetch limits shared by every hit of one request.
#[derive(Debug, Clone, Copy)]
pub struct StitchWindow {
    pub before: u64,
    pub after: u64,
    pub use_chunk_text: bool,
    /// Stitched text is cut to this many characters; `None` or 0 keeps it whole
    pub max_chars: Option<usize>,
    /// Extra points requested beyond `before + after`
    pub scroll_slack: usize,
    pub timeout_secs: u64,
}

impl StitchWindow {
    /// Inclusive chunk-index range around `chunk_index`, clamped at 0.
    pub fn range(&self, chunk_index: u64) -> (u64, u64) {
        (
            chunk_index.saturating_sub(self.before),
            chunk_index.saturating_add(self.after),
        )
    }

    fn scroll_limit(&self) -> usize {
        (self.before + self.after) as usize + self.scroll_slack
    }
}

/// Join the window's chunks in ascending chunk order, skipping other sources,
/// out-of-range points and empty bodies.
pub fn join_pieces(mut points: Vec<RawHit>, source: &str, range: (u64, u64), window: &StitchWindow) -> (String, usize) {
    points.retain(|p| p.source == source && (range.0..=range.1).contains(&p.chunk_index));
    points.sort_by_key(|p| p.chunk_index);

    let pieces: Vec<&str> = points
        .iter()
        .map(|p| p.body(window.use_chunk_text))
        .filter(|body| !body.is_empty())
        .collect();
    let joined = pieces.join(PIECE_SEPARATOR);
    let text = match window.max_chars {
        Some(n) if n > 0 => truncate_chars(&joined, n).to_string(),
        _ => joined,
    };
    (text, points.len())
}

async fn fetch_window(
    index: &dyn VectorIndex,
    collection: &str,
    hit: &Candidate,
    window: &StitchWindow,
) -> Result<Option<(String, StitchInfo)>, IndexError> {
    let source = hit.display.source.as_str();
    let range = window.range(hit.display.chunk_index);
    let filter = PointFilter::neighbors(source, range.0, range.1);
    let points = with_timeout(
        window.timeout_secs,
        index.scroll(collection, &filter, window.scroll_limit()),
    )
    .await?;

    let (text, count) = join_pieces(into_hits(points), source, range, window);
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some((
        text,
        StitchInfo {
            stitched_count: count,
            stitched_range: [range.0, range.1],
        },
    )))
}

/// Stitch one hit. Score, id and metadata are preserved.
pub async fn stitch_hit(index: &dyn VectorIndex, collection: &str, mut hit: Candidate, window: &StitchWindow) -> Candidate {
    match fetch_window(index, collection, &hit, window).await {
        Ok(Some((text, info))) => {
            hit.display.text = text;
            hit.stitched = Some(info);
        }
        Ok(None) => {
            tracing::debug!(id = %hit.id, source = %hit.display.source, "Empty stitch window, keeping hit text");
        }
        Err(e) => {
            tracing::warn!(id = %hit.id, source = %hit.display.source, error = %e, "Neighbor fetch failed, keeping hit unstitched");
        }
    }
    hit
}

/// Stitch every hit concurrently; output keeps the input order.
pub async fn stitch_all(
    index: Arc<dyn VectorIndex>,
    collection: &str,
    hits: Vec<Candidate>,
    window: StitchWindow,
) -> Vec<Candidate> {
    let mut tasks = JoinSet::new();
    for (order, hit) in hits.iter().cloned().enumerate() {
        let index = Arc::clone(&index);
        let collection = collection.to_string();
        tasks.spawn(async move { (order, stitch_hit(index.as_ref(), &collection, hit, &window).await) });
    }

    let mut slots: Vec<Option<Candidate>> = vec![None; hits.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((order, stitched)) => slots[order] = Some(stitched),
            Err(e) => tracing::warn!(error = %e, "Stitch task failed"),
        }
    }

    // a task that died leaves its original hit in place
    slots
        .into_iter()
        .zip(hits)
        .map(|(stitched, original)| stitched.unwrap_or(original))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use crate::index::{ChunkPayload, PointId};
    use crate::search::test_support::candidate;

    fn window(before: u64, after: u64) -> StitchWindow {
        StitchWindow {
            before,
            after,
            use_chunk_text: true,
            max_chars: None,
            scroll_slack: 8,
            timeout_secs: 8,
        }
    }

    fn seeded() -> Arc<InMemoryIndex> {
        let index = InMemoryIndex::new();
        // inserted out of order on purpose
        for i in [7i64, 2, 5, 9, 3, 0, 8, 4, 6, 1] {
            let payload = ChunkPayload {
                source: Some("doc.tex".to_string()),
                chunk_index: Some(i),
                chunk_text: Some(format!("c{}", i)),
                text: Some(format!("t{}", i)),
                ..ChunkPayload::default()
            };
            index.upsert("c", PointId::Num(i as u64), vec![1.0], payload).unwrap();
        }
        let other = ChunkPayload {
            source: Some("other.tex".to_string()),
            chunk_index: Some(5),
            chunk_text: Some("other".to_string()),
            ..ChunkPayload::default()
        };
        index.upsert("c", PointId::Num(100), vec![1.0], other).unwrap();
        Arc::new(index)
    }

    fn hit_at(idx: u64) -> Candidate {
        let mut c = candidate(idx, 0.42, "original");
        c.display.source = "doc.tex".to_string();
        c.display.chunk_index = idx;
        c
    }

    #[tokio::test]
    async fn test_window_concatenated_in_order() {
        let index = seeded();
        let stitched = stitch_hit(index.as_ref(), "c", hit_at(5), &window(2, 3)).await;
        assert_eq!(stitched.display.text, "c3\n\nc4\n\nc5\n\nc6\n\nc7\n\nc8");
        assert_eq!(stitched.score, 0.42);
        assert_eq!(stitched.id, PointId::Num(5));
        assert_eq!(
            stitched.stitched,
            Some(StitchInfo { stitched_count: 6, stitched_range: [3, 8] })
        );
    }

    #[tokio::test]
    async fn test_window_clamped_at_zero_and_truncated() {
        let index = seeded();
        let mut w = window(3, 1);
        w.use_chunk_text = false;
        w.max_chars = Some(6);
        let stitched = stitch_hit(index.as_ref(), "c", hit_at(1), &w).await;
        assert_eq!(stitched.display.text, "t0\n\nt1");
        assert_eq!(stitched.stitched.unwrap().stitched_range, [0, 2]);
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_original() {
        let index = seeded();
        let original = hit_at(5);
        let stitched = stitch_hit(index.as_ref(), "missing", original.clone(), &window(2, 3)).await;
        assert_eq!(stitched, original);
    }

    #[tokio::test]
    async fn test_empty_window_returns_original() {
        let index = seeded();
        let mut original = hit_at(5);
        original.display.source = "absent.tex".to_string();
        let stitched = stitch_hit(index.as_ref(), "c", original.clone(), &window(1, 1)).await;
        assert_eq!(stitched, original);
    }

    #[tokio::test]
    async fn test_stitch_all_keeps_order() {
        let index: Arc<dyn VectorIndex> = seeded();
        let hits = vec![hit_at(9), hit_at(0), hit_at(4)];
        let stitched = stitch_all(index, "c", hits, window(0, 0)).await;
        let texts: Vec<&str> = stitched.iter().map(|c| c.display.text.as_str()).collect();
        assert_eq!(texts, vec!["c9", "c0", "c4"]);
    }
}
