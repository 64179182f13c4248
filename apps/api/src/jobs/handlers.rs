use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::documents::extract_text;
use crate::errors::AppError;
use crate::jobs::service::{create_job, get_job, list_jobs, split_pdf_text};
use crate::models::job::JobPostingRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub title: String,
    pub raw_text: String,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobPostingRow>), AppError> {
    if req.raw_text.trim().is_empty() {
        return Err(AppError::Validation("raw_text may not be blank".to_string()));
    }
    let job = create_job(&state.db, &req.title, &req.raw_text).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// POST /api/v1/jobs/upload-pdf
pub async fn handle_upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobPostingRow>), AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("pdf") {
            let filename = field.file_name().unwrap_or("job.pdf").to_string();
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes.to_vec()));
        }
    }

    let (filename, bytes) = upload
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| {
            AppError::Validation("No file uploaded (expected field 'pdf')".to_string())
        })?;

    let text = tokio::task::spawn_blocking(move || extract_text(&filename, &bytes))
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}"))
        })?;

    if text.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(
            "No text could be extracted from the uploaded PDF".to_string(),
        ));
    }

    let (title, raw_text) = split_pdf_text(&text);
    let job = create_job(&state.db, &title, &raw_text).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobPostingRow>>, AppError> {
    Ok(Json(list_jobs(&state.db).await?))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<JobPostingRow>, AppError> {
    Ok(Json(get_job(&state.db, job_id).await?))
}
