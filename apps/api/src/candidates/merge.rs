//! Caller-field merge for candidate submissions.
//!
//! Callers may only set the identity fields below. Everything the scoring
//! pipeline derives is pipeline-owned and rejected if a caller supplies it.

use crate::errors::AppError;
use crate::models::candidate::CandidateRow;

/// Form fields a caller may never set.
pub const PIPELINE_OWNED_FIELDS: &[&str] = &[
    "resume_text",
    "parsed_text",
    "video_transcript",
    "lexical_score",
    "semantic_score",
    "external_score",
    "local_score",
    "keyword_boost",
    "matched_keywords",
    "final_score",
    "score",
    "missing_skills",
    "feedback",
    "verdict",
    "scoring_mode",
    "external_status",
];

pub const MAX_NAME_CHARS: usize = 120;

pub fn is_pipeline_owned(field: &str) -> bool {
    PIPELINE_OWNED_FIELDS.contains(&field)
}

/// Lowercased and trimmed; rejects anything that is obviously not an address.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if !well_formed || email.contains(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email)
}

/// Caller-supplied fields of one submission. `None` means "not sent".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Identity fields as they will be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields {
    pub first_name: String,
    pub last_name: String,
}

/// Sent fields overwrite the existing record's values; unsent fields keep
/// them. On the create path unsent fields are empty.
pub fn merge(existing: Option<&CandidateRow>, incoming: &CallerFields) -> ResolvedFields {
    let pick = |sent: &Option<String>, current: Option<&String>| -> String {
        match sent {
            Some(value) => clean_name(value),
            None => current.cloned().unwrap_or_default(),
        }
    };

    ResolvedFields {
        first_name: pick(&incoming.first_name, existing.map(|r| &r.first_name)),
        last_name: pick(&incoming.last_name, existing.map(|r| &r.last_name)),
    }
}

fn clean_name(value: &str) -> String {
    value.trim().chars().take(MAX_NAME_CHARS).collect()
}
