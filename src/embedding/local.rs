/// Local embedding provider using fastembed
///
/// Provides offline embedding generation; the default model is
/// multilingual-e5-small, which handles the Russian corpus. The output
/// dimension is measured once at load time by embedding a sample word.
/// No API key required; model weights are downloaded and cached locally.
/// All CPU-bound fastembed calls are wrapped in spawn_blocking to avoid blocking async runtime.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task;

use super::{EmbeddingError, EmbeddingProvider};

/// Supported model names and their fastembed variant.
fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(EmbeddingError::NotConfigured(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

/// Text embedded once at load time to measure the model's output dimension.
const DIMENSION_SAMPLE_TEXT: &str = "граф";

/// Output dimension read off the embedding of `DIMENSION_SAMPLE_TEXT`.
fn measured_dimension(embeddings: &[Vec<f32>]) -> Result<usize, EmbeddingError> {
    match embeddings.first().map(Vec::len) {
        Some(dim) if dim > 0 => Ok(dim),
        _ => Err(EmbeddingError::ModelInit(
            "model returned an empty embedding for the dimension check".to_string(),
        )),
    }
}

/// Local embedding provider backed by fastembed.
///
/// fastembed inference needs `&mut`, so the model sits behind a mutex and
/// embed() runs it on the blocking pool.
pub struct LocalEmbeddingProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    name: String,
    dim: usize,
}

impl LocalEmbeddingProvider {
    /// Create a new LocalEmbeddingProvider, downloading model weights if not cached.
    ///
    /// # Arguments
    /// * `cache_dir` - Directory to cache model weights (fastembed downloads on first use)
    /// * `model_name` - One of the supported model names (see `resolve_model`)
    pub async fn new(cache_dir: &str, model_name: &str) -> Result<Self, EmbeddingError> {
        let variant = resolve_model(model_name)?;
        let cache_path = PathBuf::from(cache_dir);
        let label = model_name.to_string();

        let (model, dim) = task::spawn_blocking(move || {
            std::fs::create_dir_all(&cache_path)
                .map_err(|e| EmbeddingError::ModelInit(format!("Failed to create cache dir: {}", e)))?;
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(variant)
                    .with_cache_dir(cache_path)
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbeddingError::ModelInit(format!("Failed to load {}: {}", label, e)))?;
            let sample = model
                .embed(vec![DIMENSION_SAMPLE_TEXT.to_string()], None)
                .map_err(|e| EmbeddingError::ModelInit(format!("Dimension check failed for {}: {}", label, e)))?;
            let dim = measured_dimension(&sample)?;
            Ok::<_, EmbeddingError>((model, dim))
        })
        .await
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))??;

        tracing::info!(model = model_name, dimension = dim, "Loaded local embedding model");

        Ok(LocalEmbeddingProvider {
            model: Arc::new(Mutex::new(model)),
            name: model_name.to_string(),
            dim,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        let input = vec![text.to_string()];

        let mut embeddings = task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| EmbeddingError::Generation("embedding model lock poisoned".to_string()))?;
            let result = guard
                .embed(input, None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()));
            result
        })
        .await
        .map_err(|e| EmbeddingError::Generation(e.to_string()))??;

        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::Generation("model returned no embedding".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
