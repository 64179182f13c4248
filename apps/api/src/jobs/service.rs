use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::job::JobPostingRow;
use crate::screening::keywords::job_skills;

pub const UNTITLED_JOB: &str = "Untitled Job";
pub const MAX_TITLE_CHARS: usize = 255;

/// Trimmed, capped at 255 chars; blank becomes "Untitled Job".
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return UNTITLED_JOB.to_string();
    }
    trimmed.chars().take(MAX_TITLE_CHARS).collect()
}

/// Splits text pulled out of a job description PDF into (title, body).
///
/// The first non-blank line is the title; the remaining non-blank lines,
/// trimmed and newline-joined, are the body. A document with a single
/// non-blank line keeps the whole text as its body.
pub fn split_pdf_text(text: &str) -> (String, String) {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some((first, rest)) = lines.split_first() else {
        return (UNTITLED_JOB.to_string(), text.to_string());
    };

    let title = normalize_title(first);
    let body = if rest.is_empty() {
        text.to_string()
    } else {
        rest.join("\n")
    };
    (title, body)
}

pub async fn create_job(
    pool: &PgPool,
    title: &str,
    raw_text: &str,
) -> Result<JobPostingRow, AppError> {
    let title = normalize_title(title);
    let parsed_keywords = job_skills(raw_text);

    let job = sqlx::query_as::<_, JobPostingRow>(
        r#"
        INSERT INTO job_postings (title, raw_text, parsed_keywords)
        VALUES ($1, $2, $3)
        RETURNING id, title, raw_text, parsed_keywords, created_at
        "#,
    )
    .bind(&title)
    .bind(raw_text)
    .bind(&parsed_keywords)
    .fetch_one(pool)
    .await?;

    info!(
        "Created job posting {} '{}' with {} keywords",
        job.id,
        job.title,
        job.parsed_keywords.len()
    );
    Ok(job)
}

pub async fn list_jobs(pool: &PgPool) -> Result<Vec<JobPostingRow>, AppError> {
    let jobs = sqlx::query_as::<_, JobPostingRow>(
        "SELECT id, title, raw_text, parsed_keywords, created_at \
         FROM job_postings ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

pub async fn get_job(pool: &PgPool, job_id: i64) -> Result<JobPostingRow, AppError> {
    sqlx::query_as::<_, JobPostingRow>(
        "SELECT id, title, raw_text, parsed_keywords, created_at FROM job_postings WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Job posting {job_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_becomes_untitled() {
        assert_eq!(normalize_title("   "), UNTITLED_JOB);
        assert_eq!(normalize_title("  Data Engineer "), "Data Engineer");
    }

    #[test]
    fn test_title_is_capped() {
        let long = "a".repeat(400);
        assert_eq!(normalize_title(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_pdf_split_first_line_is_title() {
        let text = "\n  Backend Engineer  \n\nPython, SQL\n  Docker \n";
        let (title, body) = split_pdf_text(text);
        assert_eq!(title, "Backend Engineer");
        assert_eq!(body, "Python, SQL\nDocker");
    }

    #[test]
    fn test_pdf_split_single_line_keeps_text() {
        let text = "Rust developer wanted\n";
        let (title, body) = split_pdf_text(text);
        assert_eq!(title, "Rust developer wanted");
        assert_eq!(body, text);
    }

    #[test]
    fn test_pdf_split_empty_document() {
        let (title, body) = split_pdf_text("  \n \n");
        assert_eq!(title, UNTITLED_JOB);
        assert_eq!(body, "  \n \n");
    }
}
