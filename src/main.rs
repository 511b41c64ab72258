use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use ragfuse::config::Config;
use ragfuse::embedding::EmbeddingHandle;
use ragfuse::index::qdrant::QdrantIndex;
use ragfuse::index::{Distance, VectorIndex};
use ragfuse::logging;
use ragfuse::pipeline::{RagParams, RagRequest, RetrievalPipeline, SearchParams, SearchRequest};
use ragfuse::server::RetrievalService;
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "ragfuse", version, about = "Hybrid lexical/vector retrieval server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio (default)
    Serve,
    /// Run a ranked search and print the JSON response
    Search {
        query: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Stitch neighboring chunks into each result
        #[arg(long)]
        stitch: bool,
        /// Collection to search
        #[arg(long)]
        collection: Option<String>,
    },
    /// Build a RAG context and print the JSON response
    Rag {
        query: String,
        /// Number of chunks in the context
        #[arg(long)]
        limit: Option<usize>,
        /// Include score breakdowns and pool diagnostics
        #[arg(long)]
        debug: bool,
        /// Collection to search
        #[arg(long)]
        collection: Option<String>,
    },
    /// Create the collection if it does not exist
    EnsureCollection {
        /// Collection name (default: qdrant.collection)
        #[arg(long)]
        collection: Option<String>,
    },
}

fn build_pipeline(config: Arc<Config>) -> Result<RetrievalPipeline> {
    let index = QdrantIndex::new(&config.qdrant.url, config.qdrant.api_key.clone())?;
    let embedder = EmbeddingHandle::from_config(config.clone());
    Ok(RetrievalPipeline::new(Arc::new(index), embedder, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration; an invalid config stops the process before anything runs
    let config = Config::load()?;

    // 3. Initialize logging FIRST (before any other output)
    // CRITICAL: logging goes to stderr only; stdout carries JSON-RPC or the CLI response
    logging::init_logging(&config);

    let config = Arc::new(config);

    // 4. Handle subcommands
    match cli.command {
        Some(Commands::Search { query, limit, stitch, collection }) => {
            let pipeline = build_pipeline(config.clone())?;
            let params = SearchParams {
                query,
                collection,
                limit,
                stitch_neighbors: stitch.then_some(true),
                ..SearchParams::default()
            };
            let request = SearchRequest::from_params(params, &config.search)?;
            let response = pipeline.search(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Some(Commands::Rag { query, limit, debug, collection }) => {
            let pipeline = build_pipeline(config.clone())?;
            let params = RagParams {
                query,
                collection,
                limit,
                include_debug: debug.then_some(true),
                ..RagParams::default()
            };
            let request = RagRequest::from_params(params, &config.rag)?;
            let response = pipeline.rag(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Some(Commands::EnsureCollection { collection }) => {
            let name = collection.unwrap_or_else(|| config.qdrant.collection.clone());
            let distance: Distance = config
                .qdrant
                .distance
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid qdrant.distance: {}", e))?;
            let index = QdrantIndex::new(&config.qdrant.url, config.qdrant.api_key.clone())?;
            let created = index
                .ensure_collection(&name, config.qdrant.vector_size, distance)
                .await?;
            if created {
                println!("Created collection '{}' ({} dims, {}).", name, config.qdrant.vector_size, distance.as_qdrant());
            } else {
                println!("Collection '{}' already exists.", name);
            }
        }

        Some(Commands::Serve) | None => {
            // Default: start the MCP server
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "ragfuse server starting"
            );

            // The embedding model loads lazily on the first request
            let pipeline = build_pipeline(config.clone())?;
            tracing::info!(
                qdrant_url = %config.qdrant.url,
                collection = %config.qdrant.collection,
                embedding_provider = %config.embedding.provider,
                "Retrieval pipeline initialized"
            );

            let service = RetrievalService::new(Arc::new(pipeline));

            // 5. Serve via stdio transport
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let server = service.serve((stdin, stdout)).await?;

            tracing::info!("ragfuse server running, awaiting tool calls via stdio");

            // 6. Wait for shutdown (client disconnects or signal)
            server.waiting().await?;

            tracing::info!("ragfuse server stopped");
        }
    }

    Ok(())
}
