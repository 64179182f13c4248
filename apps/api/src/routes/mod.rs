pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::candidates::handlers as candidates;
use crate::jobs::handlers as jobs;
use crate::screening::handlers as screening;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Job postings
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/v1/jobs/upload-pdf", post(jobs::handle_upload_pdf))
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        // Candidates
        .route(
            "/api/v1/candidates",
            get(candidates::handle_list_candidates).post(candidates::handle_submit_candidate),
        )
        .route("/api/v1/candidates/:id", get(candidates::handle_get_candidate))
        // Stateless scoring preview
        .route("/api/v1/screening/score", post(screening::handle_score_preview))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
