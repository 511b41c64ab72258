/// Retrieval orchestration
///
/// Two request flows share one set of stages:
///
///   search: embed → pool → score(Search) → sort → truncate → [stitch]
///   rag:    embed → pool → score(Rag) → [expand] → [min_term_hits] → sort
///           → MMR or truncate → term-hit guarantee → [stitch] → context
///
/// Only input validation, embedding and the primary fetch can fail a request.
/// Probe, expansion and stitch failures are absorbed by their stages.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{Config, RagDefaults, SearchDefaults};
use crate::embedding::EmbeddingHandle;
use crate::errors::RagfuseError;
use crate::index::{PointId, VectorIndex};
use crate::query::tokens::token_set;
use crate::query::FeatureSet;
use crate::search::context::{self, Citation};
use crate::search::diversify::diversify;
use crate::search::expansion::{expand_if_weak, ExpansionLimits, ExpansionOutcome};
use crate::search::pool::{fetch_pool, FetchedPool, PoolRequest};
use crate::search::scoring::TextOptions;
use crate::search::stitch::{stitch_all, StitchWindow};
use crate::search::{sort_by_score, Candidate, DisplayPayload, ScoreBreakdown, Scorer, ScoringMode};

// ---------------------------------------------------------------------------
// Request parameters (wire shape, every field but the query optional)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language query (required)
    pub query: String,
    /// Collection to search (default: configured collection)
    pub collection: Option<String>,
    /// Maximum number of results (1-100, default: 10)
    pub limit: Option<usize>,
    /// Truncate each result text to this many characters
    pub max_chars: Option<usize>,
    /// Use the raw chunk_text field instead of text
    pub with_chunk_text: Option<bool>,
    /// Attach the per-signal score breakdown to each result
    pub include_debug: Option<bool>,
    /// Replace each result text with its neighboring chunks
    pub stitch_neighbors: Option<bool>,
    /// Chunks before the hit to stitch (0-10, default: 1)
    pub stitch_before: Option<u64>,
    /// Chunks after the hit to stitch (0-20, default: 2)
    pub stitch_after: Option<u64>,
    /// Stitch from chunk_text instead of text
    pub stitch_use_chunk_text: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct RagParams {
    /// Question to ground (required)
    pub query: String,
    /// Collection to search (default: configured collection)
    pub collection: Option<String>,
    /// Number of chunks in the context (1-20, default: 5)
    pub limit: Option<usize>,
    /// Character budget of the context (100-10000, default: 2000)
    pub context_chars: Option<usize>,
    /// Return the source of every citation
    pub include_sources: Option<bool>,
    /// Use the raw chunk_text field instead of text
    pub with_chunk_text: Option<bool>,
    /// Attach score breakdowns and pool diagnostics
    pub include_debug: Option<bool>,
    /// Keep only candidates with at least this many term occurrences or a title match
    pub min_term_hits: Option<usize>,
    /// Select with maximal marginal relevance instead of plain top-k
    pub diversify: Option<bool>,
    /// MMR relevance/redundancy trade-off (0-1, default: 0.7)
    pub mmr_lambda: Option<f64>,
    /// Override the internal candidate pool size (1-500)
    pub internal_candidates: Option<usize>,
    /// Replace each chunk with its neighboring chunks
    pub stitch_neighbors: Option<bool>,
    /// Chunks before the hit to stitch (0-20, default: 2)
    pub stitch_before: Option<u64>,
    /// Chunks after the hit to stitch (0-20, default: 8)
    pub stitch_after: Option<u64>,
    /// Stitch from chunk_text instead of text
    pub stitch_use_chunk_text: Option<bool>,
    /// Pin the top candidate and skip diversification, like search
    pub align_with_search: Option<bool>,
    /// Re-fetch a larger pool when no candidate matches a query term
    pub adaptive_expand: Option<bool>,
    /// Guarantee at least one selected chunk matches a query term
    pub require_term_hit: Option<bool>,
}

// ---------------------------------------------------------------------------
// Validated requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub collection: Option<String>,
    pub limit: usize,
    pub max_chars: Option<usize>,
    pub with_chunk_text: bool,
    pub include_debug: bool,
    pub stitch_neighbors: bool,
    pub stitch_before: u64,
    pub stitch_after: u64,
    pub stitch_use_chunk_text: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RagRequest {
    pub query: String,
    pub collection: Option<String>,
    pub limit: usize,
    pub context_chars: usize,
    pub include_sources: bool,
    pub with_chunk_text: bool,
    pub include_debug: bool,
    pub min_term_hits: usize,
    pub diversify: bool,
    pub mmr_lambda: f64,
    pub internal_candidates: Option<usize>,
    pub stitch_neighbors: bool,
    pub stitch_before: u64,
    pub stitch_after: u64,
    pub stitch_use_chunk_text: bool,
    pub align_with_search: bool,
    pub adaptive_expand: bool,
    pub require_term_hit: bool,
}

fn require_query(query: &str) -> Result<(), RagfuseError> {
    if query.trim().is_empty() {
        return Err(RagfuseError::validation(
            "query",
            "Field 'query' is required and cannot be empty",
        ));
    }
    Ok(())
}

fn check_range<T: PartialOrd + std::fmt::Display>(field: &str, value: T, min: T, max: T) -> Result<(), RagfuseError> {
    if value < min || value > max {
        return Err(RagfuseError::validation(
            field,
            &format!("Field '{}' must be between {} and {} (got {})", field, min, max, value),
        ));
    }
    Ok(())
}

impl SearchRequest {
    /// Fill omitted fields from `defaults` and validate.
    pub fn from_params(p: SearchParams, defaults: &SearchDefaults) -> Result<Self, RagfuseError> {
        let req = SearchRequest {
            query: p.query,
            collection: p.collection.filter(|c| !c.trim().is_empty()),
            limit: p.limit.unwrap_or(defaults.limit),
            max_chars: p.max_chars.or(defaults.max_chars),
            with_chunk_text: p.with_chunk_text.unwrap_or(defaults.with_chunk_text),
            include_debug: p.include_debug.unwrap_or(defaults.include_debug),
            stitch_neighbors: p.stitch_neighbors.unwrap_or(defaults.stitch_neighbors),
            stitch_before: p.stitch_before.unwrap_or(defaults.stitch_before),
            stitch_after: p.stitch_after.unwrap_or(defaults.stitch_after),
            stitch_use_chunk_text: p.stitch_use_chunk_text.unwrap_or(defaults.stitch_use_chunk_text),
        };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), RagfuseError> {
        require_query(&self.query)?;
        check_range("limit", self.limit, 1, 100)?;
        check_range("stitch_before", self.stitch_before, 0, 10)?;
        check_range("stitch_after", self.stitch_after, 0, 20)?;
        Ok(())
    }
}

impl RagRequest {
    /// Fill omitted fields from `defaults` and validate.
    pub fn from_params(p: RagParams, defaults: &RagDefaults) -> Result<Self, RagfuseError> {
        let req = RagRequest {
            query: p.query,
            collection: p.collection.filter(|c| !c.trim().is_empty()),
            limit: p.limit.unwrap_or(defaults.limit),
            context_chars: p.context_chars.unwrap_or(defaults.context_chars),
            include_sources: p.include_sources.unwrap_or(defaults.include_sources),
            with_chunk_text: p.with_chunk_text.unwrap_or(defaults.with_chunk_text),
            include_debug: p.include_debug.unwrap_or(defaults.include_debug),
            min_term_hits: p.min_term_hits.unwrap_or(defaults.min_term_hits),
            diversify: p.diversify.unwrap_or(defaults.diversify),
            mmr_lambda: p.mmr_lambda.unwrap_or(defaults.mmr_lambda),
            internal_candidates: p.internal_candidates.or(defaults.internal_candidates),
            stitch_neighbors: p.stitch_neighbors.unwrap_or(defaults.stitch_neighbors),
            stitch_before: p.stitch_before.unwrap_or(defaults.stitch_before),
            stitch_after: p.stitch_after.unwrap_or(defaults.stitch_after),
            stitch_use_chunk_text: p.stitch_use_chunk_text.unwrap_or(defaults.stitch_use_chunk_text),
            align_with_search: p.align_with_search.unwrap_or(defaults.align_with_search),
            adaptive_expand: p.adaptive_expand.unwrap_or(defaults.adaptive_expand),
            require_term_hit: p.require_term_hit.unwrap_or(defaults.require_term_hit),
        };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), RagfuseError> {
        require_query(&self.query)?;
        check_range("limit", self.limit, 1, 20)?;
        check_range("context_chars", self.context_chars, 100, 10_000)?;
        if !self.mmr_lambda.is_finite() {
            return Err(RagfuseError::validation("mmr_lambda", "Field 'mmr_lambda' must be a finite number"));
        }
        check_range("mmr_lambda", self.mmr_lambda, 0.0, 1.0)?;
        if let Some(n) = self.internal_candidates {
            check_range("internal_candidates", n, 1, 500)?;
        }
        check_range("stitch_before", self.stitch_before, 0, 20)?;
        check_range("stitch_after", self.stitch_after, 0, 20)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: PointId,
    pub score: f64,
    pub payload: DisplayPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub collection: String,
    pub query: String,
    pub results: Vec<SearchHit>,
    pub count: usize,
}

/// Pool diagnostics of one RAG request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RagDebug {
    pub pool_initial: usize,
    pub pool_after_expand: usize,
    pub expanded_pool: bool,
    pub internal_limit_used: usize,
    pub align_with_search: bool,
    pub adaptive_expand: bool,
    pub require_term_hit: bool,
    pub forced_term_hit: bool,
    pub selected_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub query: String,
    pub collection: String,
    pub context: String,
    pub chunks: Vec<Citation>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<RagDebug>,
}

// ---------------------------------------------------------------------------
// Selection helpers
// ---------------------------------------------------------------------------

/// Plain top-k, with `forced_top` prepended when it is not already selected.
pub fn select_top(candidates: &[Candidate], limit: usize, forced_top: Option<&Candidate>) -> Vec<Candidate> {
    let mut selected: Vec<Candidate> = candidates.iter().take(limit).cloned().collect();
    if let Some(top) = forced_top {
        if !selected.iter().any(|c| c.id == top.id) {
            selected.insert(0, top.clone());
            selected.truncate(limit);
        }
    }
    selected
}

/// If no selected candidate has a term hit, replace the last one with the
/// best unselected candidate that has. Returns whether a swap happened.
pub fn ensure_term_hit(selected: &mut Vec<Candidate>, candidates: &[Candidate]) -> bool {
    if selected.is_empty() || selected.iter().any(Candidate::has_term_hit) {
        return false;
    }
    let replacement = candidates
        .iter()
        .find(|c| c.has_term_hit() && !selected.iter().any(|s| s.id == c.id));
    match replacement {
        Some(c) => {
            selected.pop();
            selected.push(c.clone());
            true
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct RetrievalPipeline {
    index: Arc<dyn VectorIndex>,
    embedder: EmbeddingHandle,
    config: Arc<Config>,
}

impl RetrievalPipeline {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: EmbeddingHandle, config: Arc<Config>) -> Self {
        Self { index, embedder, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &EmbeddingHandle {
        &self.embedder
    }

    fn collection_for(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_string)
            .unwrap_or_else(|| self.config.qdrant.collection.clone())
    }

    async fn embed_query(&self, query: &str) -> Result<Arc<[f32]>, RagfuseError> {
        let vector = self.embedder.embed(query).await?;
        Ok(Arc::from(vector))
    }

    async fn fetch(
        &self,
        collection: &str,
        vector: &Arc<[f32]>,
        internal_limit: usize,
        probe_limit: usize,
        features: &FeatureSet,
    ) -> Result<FetchedPool, RagfuseError> {
        let q = &self.config.qdrant;
        let pool = fetch_pool(
            Arc::clone(&self.index),
            PoolRequest {
                collection: collection.to_string(),
                vector: Arc::clone(vector),
                internal_limit,
                probe_limit,
                source_guesses: features.source_guesses.clone(),
                primary_timeout_secs: q.primary_timeout_secs,
                aux_timeout_secs: q.aux_timeout_secs,
            },
        )
        .await?;
        Ok(pool)
    }

    /// Ranked search over the collection.
    pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse, RagfuseError> {
        req.validate()?;
        let started = Instant::now();
        let cfg = &self.config;
        let collection = self.collection_for(req.collection.as_deref());
        tracing::info!(
            collection = %collection,
            query_len = req.query.chars().count(),
            limit = req.limit,
            stitch = req.stitch_neighbors,
            "Search started"
        );

        let features = FeatureSet::extract(&req.query, &cfg.phrase);
        let vector = self.embed_query(&req.query).await?;
        let internal_limit = cfg.retrieval.search_internal_limit(req.limit);
        let pool = self
            .fetch(&collection, &vector, internal_limit, cfg.retrieval.search_probe_limit, &features)
            .await?;

        let scorer = Scorer::new(&cfg.weights, &features, cfg.retrieval.fuzzy_text_word_limit);
        let opts = TextOptions {
            with_chunk_text: req.with_chunk_text,
            display_chars: req.max_chars,
        };
        let mut candidates: Vec<Candidate> = pool
            .hits
            .iter()
            .map(|hit| scorer.score(hit, ScoringMode::Search, opts))
            .collect();
        sort_by_score(&mut candidates);
        candidates.truncate(req.limit);

        if req.stitch_neighbors && !candidates.is_empty() {
            let window = StitchWindow {
                before: req.stitch_before,
                after: req.stitch_after,
                use_chunk_text: req.stitch_use_chunk_text,
                max_chars: req.max_chars,
                scroll_slack: cfg.retrieval.stitch_scroll_slack,
                timeout_secs: cfg.qdrant.stitch_timeout_secs,
            };
            candidates = stitch_all(Arc::clone(&self.index), &collection, candidates, window).await;
        }

        let results: Vec<SearchHit> = candidates
            .into_iter()
            .map(|c| SearchHit {
                debug: req.include_debug.then(|| c.breakdown()),
                id: c.id,
                score: c.score,
                payload: c.display,
            })
            .collect();

        tracing::info!(
            collection = %collection,
            pool_size = pool.hits.len(),
            count = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search finished"
        );

        Ok(SearchResponse {
            collection,
            query: req.query,
            count: results.len(),
            results,
        })
    }

    /// Grounding context for a language model.
    pub async fn rag(&self, req: RagRequest) -> Result<RagResponse, RagfuseError> {
        req.validate()?;
        let started = Instant::now();
        let cfg = &self.config;
        let collection = self.collection_for(req.collection.as_deref());
        tracing::info!(
            collection = %collection,
            query_len = req.query.chars().count(),
            limit = req.limit,
            align_with_search = req.align_with_search,
            "RAG started"
        );

        let features = FeatureSet::extract(&req.query, &cfg.phrase);
        let vector = self.embed_query(&req.query).await?;

        let mut internal_limit = req
            .internal_candidates
            .unwrap_or_else(|| cfg.retrieval.rag_internal_limit(req.limit));
        if req.align_with_search {
            internal_limit = internal_limit.max(cfg.retrieval.search_internal_limit(req.limit));
        }

        let pool = self
            .fetch(&collection, &vector, internal_limit, cfg.retrieval.rag_probe_limit, &features)
            .await?;
        let pool_initial = pool.hits.len();

        let scorer = Scorer::new(&cfg.weights, &features, cfg.retrieval.fuzzy_text_word_limit);
        let opts = TextOptions {
            with_chunk_text: req.with_chunk_text,
            display_chars: Some(req.context_chars),
        };
        let mut candidates: Vec<Candidate> = pool
            .hits
            .iter()
            .map(|hit| scorer.score(hit, ScoringMode::Rag, opts))
            .collect();

        let expansion = if req.adaptive_expand {
            let limits = ExpansionLimits {
                internal_limit,
                internal_max: cfg.retrieval.rag_internal_max,
                cap: cfg.retrieval.expansion_cap,
                min_step: cfg.retrieval.expansion_min_step,
            };
            expand_if_weak(
                self.index.as_ref(),
                &collection,
                &vector,
                &mut candidates,
                &scorer,
                opts,
                limits,
                cfg.qdrant.primary_timeout_secs,
            )
            .await
        } else {
            ExpansionOutcome {
                expanded: false,
                pool_size: candidates.len(),
            }
        };

        if req.min_term_hits > 0 {
            candidates.retain(|c| c.signals.lex_matches >= req.min_term_hits || c.signals.title_match);
        }
        sort_by_score(&mut candidates);

        let forced_top = if req.align_with_search { candidates.first().cloned() } else { None };
        let mut selected = if req.diversify && !req.align_with_search {
            diversify(
                &candidates,
                req.limit,
                req.mmr_lambda,
                |c: &Candidate| token_set(&c.display.text),
                forced_top.as_ref(),
            )
        } else {
            select_top(&candidates, req.limit, forced_top.as_ref())
        };

        let forced_term_hit = req.require_term_hit && ensure_term_hit(&mut selected, &candidates);
        if forced_term_hit {
            tracing::debug!("Replaced last selection with a term-hit candidate");
        }

        if req.stitch_neighbors && !selected.is_empty() {
            let (before, after) = if req.align_with_search {
                (
                    req.stitch_before.max(cfg.search.stitch_before),
                    req.stitch_after.max(cfg.search.stitch_after),
                )
            } else {
                (req.stitch_before, req.stitch_after)
            };
            let window = StitchWindow {
                before,
                after,
                use_chunk_text: req.stitch_use_chunk_text,
                max_chars: Some(req.context_chars),
                scroll_slack: cfg.retrieval.stitch_scroll_slack,
                timeout_secs: cfg.qdrant.stitch_timeout_secs,
            };
            selected = stitch_all(Arc::clone(&self.index), &collection, selected, window).await;
        }

        let assembled = context::assemble(&selected, req.context_chars, req.include_debug);
        let count = assembled.citations.len();
        let sources = req
            .include_sources
            .then(|| assembled.citations.iter().map(|c| c.source.clone()).collect());
        let debug = req.include_debug.then(|| RagDebug {
            pool_initial,
            pool_after_expand: expansion.pool_size,
            expanded_pool: expansion.expanded,
            internal_limit_used: internal_limit,
            align_with_search: req.align_with_search,
            adaptive_expand: req.adaptive_expand,
            require_term_hit: req.require_term_hit,
            forced_term_hit,
            selected_count: count,
        });

        tracing::info!(
            collection = %collection,
            pool_initial = pool_initial,
            pool_after_expand = expansion.pool_size,
            expanded = expansion.expanded,
            forced_term_hit = forced_term_hit,
            count = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "RAG finished"
        );

        Ok(RagResponse {
            query: req.query,
            collection,
            context: assembled.context,
            chunks: assembled.citations,
            count,
            sources,
            debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::candidate;

    fn search_params(query: &str) -> SearchParams {
        SearchParams {
            query: query.to_string(),
            ..SearchParams::default()
        }
    }

    fn rag_params(query: &str) -> RagParams {
        RagParams {
            query: query.to_string(),
            ..RagParams::default()
        }
    }

    fn field_of(err: RagfuseError) -> Option<String> {
        match err {
            RagfuseError::Validation { field, .. } => field,
            _ => None,
        }
    }

    #[test]
    fn test_search_request_defaults() {
        let req = SearchRequest::from_params(search_params("граф"), &SearchDefaults::default()).unwrap();
        assert_eq!(req.limit, 10);
        assert_eq!(req.stitch_before, 1);
        assert_eq!(req.stitch_after, 2);
        assert!(!req.stitch_neighbors);
        assert!(req.collection.is_none());
    }

    #[test]
    fn test_empty_query_rejected() {
        let err = SearchRequest::from_params(search_params("   "), &SearchDefaults::default()).unwrap_err();
        assert_eq!(field_of(err), Some("query".to_string()));
        let err = RagRequest::from_params(rag_params(""), &RagDefaults::default()).unwrap_err();
        assert_eq!(field_of(err), Some("query".to_string()));
    }

    #[test]
    fn test_search_ranges() {
        let d = SearchDefaults::default();
        let mut p = search_params("граф");
        p.limit = Some(0);
        assert_eq!(field_of(SearchRequest::from_params(p.clone(), &d).unwrap_err()), Some("limit".to_string()));
        p.limit = Some(100);
        p.stitch_before = Some(11);
        assert_eq!(field_of(SearchRequest::from_params(p.clone(), &d).unwrap_err()), Some("stitch_before".to_string()));
        p.stitch_before = Some(10);
        p.stitch_after = Some(20);
        assert!(SearchRequest::from_params(p, &d).is_ok());
    }

    #[test]
    fn test_rag_ranges() {
        let d = RagDefaults::default();
        let mut p = rag_params("граф");
        p.limit = Some(21);
        assert_eq!(field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()), Some("limit".to_string()));
        p.limit = Some(20);
        p.context_chars = Some(99);
        assert_eq!(field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()), Some("context_chars".to_string()));
        p.context_chars = Some(10_000);
        p.mmr_lambda = Some(1.5);
        assert_eq!(field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()), Some("mmr_lambda".to_string()));
        p.mmr_lambda = Some(f64::NAN);
        assert_eq!(field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()), Some("mmr_lambda".to_string()));
        p.mmr_lambda = Some(0.0);
        p.internal_candidates = Some(501);
        assert_eq!(
            field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()),
            Some("internal_candidates".to_string())
        );
        p.internal_candidates = Some(500);
        p.stitch_after = Some(21);
        assert_eq!(field_of(RagRequest::from_params(p.clone(), &d).unwrap_err()), Some("stitch_after".to_string()));
        p.stitch_after = Some(20);
        let req = RagRequest::from_params(p, &d).unwrap();
        assert_eq!(req.stitch_before, 2);
        assert!(req.require_term_hit);
    }

    #[test]
    fn test_select_top_pins_forced_candidate() {
        let pool = vec![candidate(1, 0.9, ""), candidate(2, 0.8, ""), candidate(3, 0.7, "")];
        let pinned = candidate(9, 0.1, "");
        let ids: Vec<PointId> = select_top(&pool, 2, Some(&pinned)).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![PointId::Num(9), PointId::Num(1)]);
        assert_eq!(select_top(&pool, 2, Some(&pool[0])).len(), 2);
    }

    #[test]
    fn test_ensure_term_hit_swaps_last() {
        let mut hit = candidate(5, 0.1, "");
        hit.signals.lex_matches = 1;
        let pool = vec![candidate(1, 0.9, ""), candidate(2, 0.8, ""), candidate(3, 0.7, ""), hit];
        let mut selected = vec![pool[0].clone(), pool[1].clone()];
        assert!(ensure_term_hit(&mut selected, &pool));
        let ids: Vec<PointId> = selected.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![PointId::Num(1), PointId::Num(5)]);
        // already satisfied
        assert!(!ensure_term_hit(&mut selected, &pool));
    }

    #[test]
    fn test_ensure_term_hit_without_replacement() {
        let pool = vec![candidate(1, 0.9, ""), candidate(2, 0.8, "")];
        let mut selected = vec![pool[0].clone()];
        assert!(!ensure_term_hit(&mut selected, &pool));
        assert_eq!(selected.len(), 1);
        assert!(!ensure_term_hit(&mut Vec::new(), &pool));
    }
}
