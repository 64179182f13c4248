use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A job posting. `parsed_keywords` is always derived from `raw_text` when
/// the row is written and is never edited on its own.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: i64,
    pub title: String,
    pub raw_text: String,
    pub parsed_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}
