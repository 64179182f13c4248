use std::sync::Arc;

use sqlx::PgPool;

use crate::candidates::submit::CandidateRecordManager;
use crate::screening::pipeline::ScoringPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Scoring core. Holds the process-wide embedder and the LLM analyzer.
    pub pipeline: Arc<ScoringPipeline>,
    pub candidates: CandidateRecordManager,
    /// Request body cap for multipart uploads.
    pub max_upload_bytes: usize,
}
