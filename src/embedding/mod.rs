/// Embedding provider trait and the process-wide embedding handle
///
/// Provides a pluggable interface for query embedding.
/// Supports local fastembed models (default, no API key) and any
/// OpenAI-compatible embeddings endpoint.
///
/// The pipeline never talks to a provider directly: it goes through
/// `EmbeddingHandle`, which builds the configured provider once, checks its
/// dimension against the collection's vector size, and re-checks every vector.

pub mod local;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::Config;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// fastembed model initialization failure
    #[error("Model initialization error: {0}")]
    ModelInit(String),

    /// Embedding generation failure (inference error)
    #[error("Embedding generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider not configured (e.g., missing API key, unknown model)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Model output does not match the collection's vector size
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Core trait for embedding text into fixed-dimension float vectors.
///
/// Implementations must be Send + Sync to support use in async contexts
/// and across thread boundaries (e.g., Arc<dyn EmbeddingProvider>).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Return the model name identifier (e.g., "multilingual-e5-small").
    fn model_name(&self) -> &str;

    /// Return the dimension of the embedding vectors produced by this model.
    fn dimension(&self) -> usize;
}

/// Build the provider named by `embedding.provider`.
pub async fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.embedding.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(
                &config.embedding.cache_dir,
                &config.embedding.model,
            )
            .await?;
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = config.embedding.openai_api_key.clone().unwrap_or_default();
            let provider = openai::OpenAIEmbeddingProvider::new(
                api_key,
                &config.embedding.openai_base_url,
                &config.embedding.openai_model,
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(EmbeddingError::NotConfigured(format!(
            "Unknown embedding provider: '{}' (expected 'local' or 'openai')",
            other
        ))),
    }
}

/// Lazily initialized, shared embedding provider.
///
/// Concurrent first requests wait on a single initialization instead of
/// loading duplicate model instances. Cloning the handle shares the provider.
#[derive(Clone)]
pub struct EmbeddingHandle {
    cell: Arc<OnceCell<Arc<dyn EmbeddingProvider>>>,
    config: Option<Arc<Config>>,
    expected_dim: usize,
}

impl EmbeddingHandle {
    /// Handle that builds the configured provider on first use.
    pub fn from_config(config: Arc<Config>) -> Self {
        let expected_dim = config.qdrant.vector_size;
        EmbeddingHandle {
            cell: Arc::new(OnceCell::new()),
            config: Some(config),
            expected_dim,
        }
    }

    /// Handle around an already constructed provider.
    ///
    /// The dimension is still checked on every `embed` call.
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>, expected_dim: usize) -> Self {
        EmbeddingHandle {
            cell: Arc::new(OnceCell::new_with(Some(provider))),
            config: None,
            expected_dim,
        }
    }

    pub fn expected_dimension(&self) -> usize {
        self.expected_dim
    }

    /// Whether the provider has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// The shared provider, creating and probing it on first call.
    pub async fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                let config = self.config.as_ref().ok_or_else(|| {
                    EmbeddingError::NotConfigured("no embedding provider configured".to_string())
                })?;
                let provider = create_provider(config).await?;
                let actual = provider.dimension();
                if actual != self.expected_dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.expected_dim,
                        actual,
                    });
                }
                tracing::info!(
                    model = provider.model_name(),
                    dimension = actual,
                    "Embedding provider ready"
                );
                Ok(provider)
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    /// Embed one query. Vectors of the wrong length are rejected, never padded.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let provider = self.provider().await?;
        let vector = provider.embed(text).await?;
        if vector.len() != self.expected_dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.expected_dim,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        dim: usize,
        output_len: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; self.output_len])
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    #[tokio::test]
    async fn test_with_provider_embeds() {
        let provider = Arc::new(FixedProvider { dim: 4, output_len: 4, calls: AtomicUsize::new(0) });
        let handle = EmbeddingHandle::with_provider(provider.clone(), 4);
        assert!(handle.is_initialized());
        let v = handle.embed("граф").await.unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_length() {
        let provider = Arc::new(FixedProvider { dim: 4, output_len: 3, calls: AtomicUsize::new(0) });
        let handle = EmbeddingHandle::with_provider(provider, 4);
        let err = handle.embed("граф").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_configured() {
        let mut config = Config::default();
        config.embedding.provider = "carrier-pigeon".to_string();
        let handle = EmbeddingHandle::from_config(Arc::new(config));
        assert!(!handle.is_initialized());
        let err = handle.embed("граф").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::NotConfigured(_)));
        assert!(!handle.is_initialized());
    }

    #[tokio::test]
    async fn test_openai_dimension_checked_on_init() {
        let mut config = Config::default();
        config.embedding.provider = "openai".to_string();
        config.embedding.openai_api_key = Some("sk-test".to_string());
        // text-embedding-3-small is 1536-dimensional, the collection expects 384
        let handle = EmbeddingHandle::from_config(Arc::new(config));
        let err = handle.provider().await.err().unwrap();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { expected: 384, actual: 1536 }));
    }
}
