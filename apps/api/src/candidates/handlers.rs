use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidates::merge::{is_pipeline_owned, CallerFields};
use crate::candidates::queries::{get_candidate, list_candidates};
use crate::candidates::submit::{Submission, Upload};
use crate::errors::AppError;
use crate::models::candidate::CandidateRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidateListQuery {
    pub job_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub candidate: CandidateRow,
    /// "created" or "updated"
    pub status: &'static str,
}

/// POST /api/v1/candidates
pub async fn handle_submit_candidate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let submission = parse_submission(multipart).await?;
    let outcome = state.candidates.submit(submission).await?;

    let (status_code, status) = if outcome.created {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "updated")
    };
    Ok((
        status_code,
        Json(SubmitResponse {
            candidate: outcome.record,
            status,
        }),
    ))
}

/// GET /api/v1/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidateListQuery>,
) -> Result<Json<Vec<CandidateRow>>, AppError> {
    Ok(Json(list_candidates(&state.db, params.job_id).await?))
}

/// GET /api/v1/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<i64>,
) -> Result<Json<CandidateRow>, AppError> {
    Ok(Json(get_candidate(&state.db, candidate_id).await?))
}

/// Reads the submission form. Rejects pipeline-owned fields and missing
/// required ones before anything is stored or scored.
async fn parse_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut email: Option<String> = None;
    let mut applied_to: Option<i64> = None;
    let mut fields = CallerFields::default();
    let mut resume: Option<Upload> = None;
    let mut video: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if is_pipeline_owned(&name) {
            return Err(AppError::Validation(format!(
                "'{name}' is computed by the screening pipeline and cannot be submitted"
            )));
        }

        match name.as_str() {
            "email" => email = Some(field.text().await?),
            "applied_to" => {
                let raw = field.text().await?;
                let id = raw.trim().parse::<i64>().map_err(|_| {
                    AppError::Validation(format!("applied_to must be a job id, got '{raw}'"))
                })?;
                applied_to = Some(id);
            }
            "first_name" => fields.first_name = Some(field.text().await?),
            "last_name" => fields.last_name = Some(field.text().await?),
            "resume" => resume = read_upload(field, "resume").await?,
            "video" => video = read_upload(field, "video").await?,
            other => debug!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(Submission {
        email: email.ok_or_else(|| AppError::Validation("email is required".to_string()))?,
        applied_to: applied_to
            .ok_or_else(|| AppError::Validation("applied_to is required".to_string()))?,
        fields,
        resume: resume.ok_or_else(|| AppError::Validation("resume file is required".to_string()))?,
        video,
    })
}

/// An empty file part counts as not sent.
async fn read_upload(field: Field<'_>, default_name: &str) -> Result<Option<Upload>, AppError> {
    let filename = field.file_name().unwrap_or(default_name).to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(Upload {
        filename,
        content_type,
        bytes,
    }))
}
