/// Domain-specific error types for ragfuse
///
/// Only caller-facing failures live here. Degraded auxiliary fetches are
/// absorbed by the stage that issued them and never become a `RagfuseError`.

#[derive(Debug, thiserror::Error)]
pub enum RagfuseError {
    /// Rejected before any network call (empty query, out-of-range parameter).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    /// Embedding backend or primary vector-index fetch failed.
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::embedding::EmbeddingError> for RagfuseError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        match e {
            crate::embedding::EmbeddingError::DimensionMismatch { .. }
            | crate::embedding::EmbeddingError::NotConfigured(_) => RagfuseError::Config(e.to_string()),
            other => RagfuseError::Upstream(other.to_string()),
        }
    }
}

impl From<crate::index::IndexError> for RagfuseError {
    fn from(e: crate::index::IndexError) -> Self {
        RagfuseError::Upstream(format!("Primary vector search failed: {}", e))
    }
}

impl RagfuseError {
    /// Helper to create validation errors with field names
    ///
    /// Example:
    /// ```
    /// use ragfuse::errors::RagfuseError;
    /// let err = RagfuseError::validation("query", "Query cannot be empty");
    /// ```
    pub fn validation(field: &str, message: &str) -> Self {
        RagfuseError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}
