use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use innovatehive_rag::config::{Config, DEFAULT_CONFIG_PATH};
use innovatehive_rag::embedder::{self, Embedder};
use innovatehive_rag::http::{self, AppState};
use innovatehive_rag::llm::gemini::GeminiModel;
use innovatehive_rag::rag::{AnswerComposer, RagService, Retriever, bootstrap};

#[derive(Parser, Debug)]
#[command(version, about = "Retrieval-augmented chat backend")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Address to listen on, overriding `server.bind`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting InnovateHive RAG server...");

    // 1. Load config
    let mut config = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    config.validate()?;

    // 2. Init language model
    let model = GeminiModel::from_config(&config.llm).context("Failed to initialise language model")?;

    // 3. Init embedder and index (both block: downloads, ONNX, SQLite)
    let embedder_config = config.embedder.clone();
    let index_config = config.index.clone();
    let (embedder, index) = tokio::task::spawn_blocking(move || -> Result<_> {
        let embedder: Arc<dyn Embedder> =
            embedder::from_config(&embedder_config).context("Failed to initialise embedder")?;
        let index = bootstrap::ensure_index(&index_config, embedder.as_ref())
            .context("Failed to prepare vector index")?;
        Ok((embedder, index))
    })
    .await
    .context("Startup task panicked")??;

    // 4. Wire the service
    let retriever = Retriever::new(Arc::new(index), embedder, config.index.top_k);
    let composer = AnswerComposer::new(Arc::new(model), Duration::from_secs(config.llm.timeout_secs));
    let state = AppState::new(RagService::new(retriever, composer));

    // 5. Start server
    let listener = tokio::net::TcpListener::bind(config.server.bind.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    http::serve(listener, state).await
}
