use rmcp::{
    ServerHandler,
    tool,
    model::{ServerCapabilities, Implementation, ProtocolVersion, CallToolResult},
    handler::server::wrapper::Parameters,
    ErrorData as McpError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::RagfuseError;
use crate::index::with_timeout;
use crate::pipeline::{RagParams, RagRequest, RetrievalPipeline, SearchParams, SearchRequest};

pub struct RetrievalService {
    pipeline: Arc<RetrievalPipeline>,
    start_time: Instant,
}

impl RetrievalService {
    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        Self {
            pipeline,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// Helper: convert RagfuseError to CallToolResult with isError: true
fn error_to_result(err: RagfuseError) -> CallToolResult {
    match err {
        RagfuseError::Validation { message, field } => {
            let mut obj = json!({
                "isError": true,
                "error": message,
            });
            if let Some(f) = field {
                obj["field"] = json!(f);
            }
            CallToolResult::structured_error(obj)
        }
        RagfuseError::Upstream(msg) => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": msg,
                "hint": "Check that the vector index is reachable and the embedding model is available, then retry"
            }))
        }
        RagfuseError::Config(msg) => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": format!("Configuration error: {}", msg),
                "hint": "Fix ragfuse.toml or RAGFUSE_* environment variables and restart the server"
            }))
        }
        other => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": other.to_string()
            }))
        }
    }
}

fn to_structured<T: serde::Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_value(value) {
        Ok(v) => CallToolResult::structured(v),
        Err(e) => error_to_result(RagfuseError::Internal(format!("Failed to serialize response: {}", e))),
    }
}

// Tool implementations
#[rmcp::tool_router]
impl RetrievalService {
    #[tool(description = "Hybrid search over document chunks. Combines vector similarity with lexical, phrase and title signals; optionally stitches neighboring chunks into each result.")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "search",
            collection = ?params.collection,
            limit = ?params.limit,
            "Tool called"
        );

        let request = match SearchRequest::from_params(params, &self.pipeline.config().search) {
            Ok(r) => r,
            Err(e) => return Ok(error_to_result(e)),
        };

        match self.pipeline.search(request).await {
            Ok(response) => Ok(to_structured(&response)),
            Err(e) => {
                tracing::warn!(tool = "search", error = %e, "Tool failed");
                Ok(error_to_result(e))
            }
        }
    }

    #[tool(description = "Build a grounding context for a question: a diverse, term-matched selection of chunks stitched with their neighbors, plus citations and sources.")]
    async fn rag(
        &self,
        Parameters(params): Parameters<RagParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "rag",
            collection = ?params.collection,
            limit = ?params.limit,
            align_with_search = ?params.align_with_search,
            "Tool called"
        );

        let request = match RagRequest::from_params(params, &self.pipeline.config().rag) {
            Ok(r) => r,
            Err(e) => return Ok(error_to_result(e)),
        };

        match self.pipeline.rag(request).await {
            Ok(response) => Ok(to_structured(&response)),
            Err(e) => {
                tracing::warn!(tool = "rag", error = %e, "Tool failed");
                Ok(error_to_result(e))
            }
        }
    }

    #[tool(description = "Check server health, vector index reachability and embedding model state")]
    async fn health_check(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "health_check", "Tool called");

        let config = self.pipeline.config();
        let collection = &config.qdrant.collection;
        let index_status = match with_timeout(
            config.qdrant.aux_timeout_secs,
            self.pipeline.index().collection_exists(collection),
        )
        .await
        {
            Ok(true) => "ok",
            Ok(false) => "missing_collection",
            Err(e) => {
                tracing::warn!(error = %e, "Health check could not reach the vector index");
                "unreachable"
            }
        };

        let response = json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.uptime_seconds(),
            "collection": collection,
            "index": index_status,
            "embedding_loaded": self.pipeline.embedder().is_initialized(),
            "vector_size": self.pipeline.embedder().expected_dimension(),
        });
        Ok(CallToolResult::structured(response))
    }
}

// ServerHandler implementation
#[rmcp::tool_handler(router = Self::tool_router())]
impl ServerHandler for RetrievalService {
    fn get_info(&self) -> rmcp::model::InitializeResult {
        rmcp::model::InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "ragfuse".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some("Hybrid lexical/vector retrieval and reranking over a Qdrant chunk collection".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Retrieval server. Tools: search (ranked chunks), rag (grounding context with citations), health_check.".to_string()
            ),
        }
    }
}
