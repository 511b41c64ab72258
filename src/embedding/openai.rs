/// OpenAI-compatible embedding provider
///
/// Calls an OpenAI-style `/embeddings` endpoint using reqwest. The base URL is
/// configurable so self-hosted gateways serving the same API work unchanged.
/// Requires RAGFUSE_EMBEDDING__OPENAI_API_KEY env var or openai_api_key in config.

use async_trait::async_trait;
use std::time::Duration;

use super::{EmbeddingError, EmbeddingProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body for the Embeddings API
#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

/// Response from the Embeddings API
#[derive(serde::Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

/// Single embedding result
#[derive(serde::Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// Output dimension of the known embedding models.
fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "multilingual-e5-small" => Some(384),
        "multilingual-e5-base" => Some(768),
        "multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

/// OpenAI-backed embedding provider.
///
/// The API key is checked on construction, not at embed time.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dim: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new OpenAIEmbeddingProvider.
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotConfigured` if api_key is empty or the
    /// model's dimension is unknown.
    pub fn new(api_key: String, base_url: &str, model: &str) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::NotConfigured(
                "OpenAI API key is required when using the openai embedding provider. \
                 Set RAGFUSE_EMBEDDING__OPENAI_API_KEY or openai_api_key in ragfuse.toml"
                    .to_string(),
            ));
        }
        let dim = model_dimension(model).ok_or_else(|| {
            EmbeddingError::NotConfigured(format!("Unknown embedding model '{}'", model))
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::ModelInit(format!("Failed to build HTTP client: {}", e)))?;

        Ok(OpenAIEmbeddingProvider {
            client,
            api_key,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dim,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EmbeddingError::Api {
                status,
                message: body,
            });
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("Failed to parse API response: {}", e)))?;

        embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Generation("API returned empty embedding list".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
