use axum::{extract::State, Json};
use serde::Deserialize;

use crate::screening::aggregate::AggregationMode;
use crate::screening::keywords::job_skills;
use crate::screening::pipeline::ScoreCard;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScorePreviewRequest {
    pub job_text: String,
    pub resume_text: String,
    /// Defaults to the configured mode.
    #[serde(default)]
    pub mode: Option<AggregationMode>,
}

/// POST /api/v1/screening/score
/// Scores raw texts without storing anything.
pub async fn handle_score_preview(
    State(state): State<AppState>,
    Json(req): Json<ScorePreviewRequest>,
) -> Json<ScoreCard> {
    let skills = job_skills(&req.job_text);
    let mode = req.mode.unwrap_or(state.pipeline.aggregator().mode);
    let card = state
        .pipeline
        .score_with_mode(mode, &req.job_text, &skills, &req.resume_text)
        .await;
    Json(card)
}
