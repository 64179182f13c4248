mod candidates;
mod config;
mod db;
mod documents;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;
mod storage;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::candidates::submit::CandidateRecordManager;
use crate::config::Config;
use crate::db::{create_pool, migrate};
use crate::documents::transcribe::build_transcriber;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::aggregate::ScoreAggregator;
use crate::screening::embedding::{install_shared, load_embedder};
use crate::screening::external::LlmAnalyzer;
use crate::screening::pipeline::ScoringPipeline;
use crate::screening::semantic::SemanticMatcher;
use crate::state::AppState;
use crate::storage::{build_s3_client, S3DocumentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    migrate(&db).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let store = Arc::new(S3DocumentStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM client; a missing key means local-fallback scoring
    let llm = LlmClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
        config.llm_timeout,
    )
    .context("Failed to build LLM HTTP client")?;
    if llm.has_api_key() {
        info!("LLM client initialized (model: {})", llm.model());
    } else {
        info!("GEMINI_API_KEY not set; external analysis will use the local fallback");
    }

    // Load the embedding model once; every request shares it
    let embedder = install_shared(load_embedder(&config)?);

    let aggregator = ScoreAggregator::new(
        config.scoring_mode,
        config.keyword_weight,
        config.keyword_top_n,
    );
    info!("Scoring mode: {}", aggregator.mode.as_str());
    let pipeline = Arc::new(ScoringPipeline::new(
        SemanticMatcher::new(embedder),
        Arc::new(LlmAnalyzer::new(llm)),
        aggregator,
    ));

    let transcriber = build_transcriber(&config)?;
    let candidates =
        CandidateRecordManager::new(db.clone(), store, pipeline.clone(), transcriber);

    // Build app state
    let state = AppState {
        db,
        pipeline,
        candidates,
        max_upload_bytes: config.max_upload_bytes,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
