/// Vector index abstraction layer
///
/// Provides the VectorIndex trait and the typed point model shared by all
/// backends. Backends return loosely-typed `RawPoint`s exactly as the store
/// holds them; `RawHit::try_from` is the single place where required payload
/// fields are checked, so scoring never sees a point without a source or
/// chunk index.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from a vector index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Index API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode index response: {0}")]
    Decode(String),

    /// Request did not complete within the given number of seconds
    #[error("Index request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid point: {0}")]
    InvalidPoint(String),
}

/// Point identifier: Qdrant accepts unsigned integers or UUID strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Uuid(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        PointId::Num(n)
    }
}

/// Chunk payload as stored by the ingestion pipeline. Every field may be absent.
///
/// Fields are decoded leniently: a value of the wrong JSON type is coerced
/// when it has an obvious reading (`"3"` or `3.0` as a chunk index, `1` as a
/// flag, a number as a title) and becomes `None` otherwise. Decoding a
/// payload object never fails; `RawHit::try_from` decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPayload {
    #[serde(deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient::index")]
    pub chunk_index: Option<i64>,
    #[serde(deserialize_with = "lenient::string")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub chunk_text: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_definition: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_algorithm: Option<bool>,
    #[serde(deserialize_with = "lenient::flag")]
    pub has_math: Option<bool>,
    #[serde(deserialize_with = "lenient::string")]
    pub algorithm_name: Option<String>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::{Number, Value};

    /// Largest magnitude at which every integer is exactly representable in f64.
    const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

    fn integral(f: f64) -> Option<i64> {
        (f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64).then_some(f as i64)
    }

    fn number_to_index(n: &Number) -> Option<i64> {
        n.as_i64().or_else(|| n.as_f64().and_then(integral))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn index<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => number_to_index(&n),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
            _ => None,
        })
    }

    /// Truthiness: non-zero numbers and non-empty strings or containers are true.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::Bool(b) => Some(b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => Some(!s.is_empty()),
            Value::Array(a) => Some(!a.is_empty()),
            Value::Object(o) => Some(!o.is_empty()),
        })
    }
}

/// A point as returned by `search` (with score) or `scroll` (score absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPoint {
    pub id: PointId,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub payload: Option<ChunkPayload>,
}

/// A validated hit: `source` and `chunk_index` are guaranteed present.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: PointId,
    /// Raw similarity; non-finite backend scores are replaced with 0.0
    pub vector_score: f64,
    pub title: String,
    pub source: String,
    pub chunk_index: u64,
    pub text: Option<String>,
    pub chunk_text: Option<String>,
    pub is_definition: bool,
    pub is_algorithm: bool,
    pub has_math: bool,
    pub algorithm_name: Option<String>,
}

impl TryFrom<RawPoint> for RawHit {
    type Error = IndexError;

    fn try_from(point: RawPoint) -> Result<Self, Self::Error> {
        let payload = point
            .payload
            .ok_or_else(|| IndexError::InvalidPoint(format!("point {} has no payload", point.id)))?;
        let source = payload
            .source
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IndexError::InvalidPoint(format!("point {} has no source", point.id)))?;
        let chunk_index = match payload.chunk_index {
            Some(idx) if idx >= 0 => idx as u64,
            Some(idx) => {
                return Err(IndexError::InvalidPoint(format!(
                    "point {} has negative chunk_index {}",
                    point.id, idx
                )))
            }
            None => {
                return Err(IndexError::InvalidPoint(format!(
                    "point {} has no chunk_index",
                    point.id
                )))
            }
        };
        let vector_score = point.score.filter(|s| s.is_finite()).unwrap_or(0.0);

        Ok(RawHit {
            id: point.id,
            vector_score,
            title: payload.title.unwrap_or_default(),
            source,
            chunk_index,
            text: payload.text,
            chunk_text: payload.chunk_text,
            is_definition: payload.is_definition.unwrap_or(false),
            is_algorithm: payload.is_algorithm.unwrap_or(false),
            has_math: payload.has_math.unwrap_or(false),
            algorithm_name: payload.algorithm_name,
        })
    }
}

impl RawHit {
    /// Text used for scoring and display.
    ///
    /// With `prefer_chunk_text` only `chunk_text` is used; otherwise `text`
    /// falls back to `chunk_text` when missing or empty.
    pub fn body(&self, prefer_chunk_text: bool) -> &str {
        let chunk_text = self.chunk_text.as_deref().unwrap_or("");
        if prefer_chunk_text {
            return chunk_text;
        }
        match self.text.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => chunk_text,
        }
    }
}

/// Convert backend points into validated hits, dropping invalid ones.
pub fn into_hits(points: Vec<RawPoint>) -> Vec<RawHit> {
    points
        .into_iter()
        .filter_map(|p| match RawHit::try_from(p) {
            Ok(hit) => Some(hit),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping invalid point");
                None
            }
        })
        .collect()
}

/// Payload filter: exact source match and/or an inclusive chunk-index range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFilter {
    pub source: Option<String>,
    pub chunk_range: Option<(u64, u64)>,
}

impl PointFilter {
    pub fn source(source: impl Into<String>) -> Self {
        PointFilter {
            source: Some(source.into()),
            chunk_range: None,
        }
    }

    /// Chunks of `source` with `gte <= chunk_index <= lte`.
    pub fn neighbors(source: impl Into<String>, gte: u64, lte: u64) -> Self {
        PointFilter {
            source: Some(source.into()),
            chunk_range: Some((gte, lte)),
        }
    }

    /// Render as a Qdrant `must` filter.
    pub fn to_qdrant(&self) -> serde_json::Value {
        let mut must = Vec::new();
        if let Some(source) = &self.source {
            must.push(serde_json::json!({"key": "source", "match": {"value": source}}));
        }
        if let Some((gte, lte)) = self.chunk_range {
            must.push(serde_json::json!({"key": "chunk_index", "range": {"gte": gte, "lte": lte}}));
        }
        serde_json::json!({ "must": must })
    }

    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        if let Some(source) = &self.source {
            if payload.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        if let Some((gte, lte)) = self.chunk_range {
            match payload.chunk_index {
                Some(idx) if idx >= 0 && (gte..=lte).contains(&(idx as u64)) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    /// Name used by the Qdrant collections API.
    pub fn as_qdrant(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

impl FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cos" | "cosine" => Ok(Distance::Cosine),
            "dot" | "dotproduct" | "ip" => Ok(Distance::Dot),
            "l2" | "euclid" | "euclidean" => Ok(Distance::Euclid),
            other => Err(format!("Unsupported distance metric: {}", other)),
        }
    }
}

/// Core trait for a nearest-neighbor store holding chunk points.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `limit` points by similarity, best first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PointFilter>,
    ) -> Result<Vec<RawPoint>, IndexError>;

    /// Up to `limit` points matching `filter`, in no particular order.
    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<RawPoint>, IndexError>;

    async fn collection_exists(&self, collection: &str) -> Result<bool, IndexError>;

    /// Create the collection if absent. Returns true if it was created.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<bool, IndexError>;
}

/// Run an index call under a deadline.
pub async fn with_timeout<T, F>(secs: u64, fut: F) -> Result<T, IndexError>
where
    F: Future<Output = Result<T, IndexError>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(IndexError::Timeout(secs)),
    }
}
