use sqlx::{PgExecutor, PgPool};

use crate::errors::AppError;
use crate::models::candidate::CandidateRow;

/// Candidate columns plus the title of the job applied to.
const CANDIDATE_SELECT: &str = r#"
    SELECT c.*, j.title AS applied_to_title
    FROM candidate_profiles c
    JOIN job_postings j ON j.id = c.applied_to
"#;

pub async fn fetch_candidate<'e, E>(
    executor: E,
    candidate_id: i64,
) -> Result<Option<CandidateRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("{CANDIDATE_SELECT} WHERE c.id = $1");
    sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(candidate_id)
        .fetch_optional(executor)
        .await
}

pub async fn get_candidate(pool: &PgPool, candidate_id: i64) -> Result<CandidateRow, AppError> {
    fetch_candidate(pool, candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Candidate {candidate_id} not found")))
}

/// Newest first, optionally limited to one job.
pub async fn list_candidates(
    pool: &PgPool,
    job_id: Option<i64>,
) -> Result<Vec<CandidateRow>, AppError> {
    let sql = format!(
        "{CANDIDATE_SELECT} WHERE ($1::BIGINT IS NULL OR c.applied_to = $1) \
         ORDER BY c.created_at DESC, c.id DESC"
    );
    let rows = sqlx::query_as::<_, CandidateRow>(&sql)
        .bind(job_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
