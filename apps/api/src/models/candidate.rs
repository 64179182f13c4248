use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One candidate's application to one job; `(email, applied_to)` is unique.
///
/// Everything from `resume_text` down is written by the scoring pipeline in
/// a single statement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub applied_to: i64,
    /// Joined from `job_postings`; absent on rows read without the join.
    #[sqlx(default)]
    pub applied_to_title: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_key: Option<String>,
    pub video_key: Option<String>,
    pub resume_text: String,
    pub video_transcript: Option<String>,
    pub lexical_score: Option<f64>,
    pub semantic_score: Option<f64>,
    pub external_score: Option<f64>,
    pub local_score: Option<f64>,
    pub keyword_boost: Option<f64>,
    pub matched_keywords: Vec<String>,
    pub final_score: Option<f64>,
    pub missing_skills: Vec<String>,
    pub feedback: String,
    /// High | Medium | Low | Unknown
    pub verdict: String,
    pub scoring_mode: Option<String>,
    pub external_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
