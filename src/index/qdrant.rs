/// Qdrant REST backend
///
/// Talks to the Qdrant HTTP API with reqwest: `points/search`, `points/scroll`
/// and the collections endpoints. Per-call deadlines are applied by the
/// callers (`index::with_timeout`), not by the client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Distance, IndexError, PointFilter, RawPoint, VectorIndex};

/// Qdrant wraps every response body in `{"result": ..., "status": ...}`.
#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IndexError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(QdrantIndex {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, collection, suffix)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, IndexError> {
        let response = builder
            .send()
            .await
            .map_err(|e| IndexError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(IndexError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(envelope.result)
    }
}

/// Decode points one at a time so a single malformed point is dropped
/// instead of failing the whole response.
fn decode_points(values: Vec<serde_json::Value>) -> Vec<RawPoint> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawPoint>(value) {
            Ok(point) => Some(point),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable point");
                None
            }
        })
        .collect()
}

/// Body of a `points/search` request.
fn search_body(vector: &[f32], limit: usize, filter: Option<&PointFilter>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
    });
    if let Some(f) = filter {
        body["filter"] = f.to_qdrant();
    }
    body
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PointFilter>,
    ) -> Result<Vec<RawPoint>, IndexError> {
        let url = self.collection_url(collection, "/points/search");
        let builder = self
            .request(reqwest::Method::POST, url)
            .json(&search_body(vector, limit, filter));
        let values: Vec<serde_json::Value> = self.send(builder).await?;
        let mut points = decode_points(values);
        points.truncate(limit);
        Ok(points)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<RawPoint>, IndexError> {
        let url = self.collection_url(collection, "/points/scroll");
        let body = serde_json::json!({
            "filter": filter.to_qdrant(),
            "with_payload": true,
            "limit": limit,
        });
        let builder = self.request(reqwest::Method::POST, url).json(&body);
        let result: ScrollResult = self.send(builder).await?;
        Ok(decode_points(result.points))
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, IndexError> {
        let url = format!("{}/collections", self.base_url);
        let result: CollectionsResult = self.send(self.request(reqwest::Method::GET, url)).await?;
        Ok(result.collections.iter().any(|c| c.name == collection))
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<bool, IndexError> {
        if self.collection_exists(collection).await? {
            return Ok(false);
        }
        let body = serde_json::json!({
            "vectors": {"size": vector_size, "distance": distance.as_qdrant()},
        });
        let builder = self
            .request(reqwest::Method::PUT, self.collection_url(collection, ""))
            .json(&body);
        let _: serde_json::Value = self.send(builder).await?;
        tracing::info!(collection = collection, vector_size = vector_size, distance = distance.as_qdrant(), "Created collection");
        Ok(true)
    }
}
