//! External analysis: asks the remote language model for a holistic match
//! assessment. Never fails: every error becomes a degraded `ExternalAnalysis`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::llm_client::{strip_json_fences, LlmClient, LlmError};
use crate::screening::prompts::resume_analysis_prompt;

/// Raw model output longer than this is cut before landing in `feedback`.
pub const MAX_RAW_FEEDBACK_CHARS: usize = 1000;

pub const NO_API_KEY_FEEDBACK: &str = "No LLM API key provided; used fallback scoring.";

/// How the external result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The model answered with parseable JSON.
    Completed,
    /// The model answered, but not with JSON; raw text is in `feedback`.
    Unparsed,
    /// No API key configured; no call was made.
    LocalFallback,
    /// Network, timeout or HTTP failure; the error is in `feedback`.
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Unparsed => "unparsed",
            AnalysisStatus::LocalFallback => "local_fallback",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAnalysis {
    /// 0 – 100 when the model produced a number.
    pub match_score: Option<i64>,
    pub missing_skills: Vec<String>,
    pub feedback: String,
    pub status: AnalysisStatus,
}

impl ExternalAnalysis {
    pub fn local_fallback() -> Self {
        Self::degraded(AnalysisStatus::LocalFallback, NO_API_KEY_FEEDBACK.to_string())
    }

    pub fn failed(error: &LlmError) -> Self {
        let indicator = if error.is_timeout() {
            format!("LLM API error (timeout): {error}")
        } else {
            format!("LLM API error: {error}")
        };
        Self::degraded(AnalysisStatus::Failed, indicator)
    }

    fn degraded(status: AnalysisStatus, feedback: String) -> Self {
        Self {
            match_score: None,
            missing_skills: vec![],
            feedback,
            status,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status != AnalysisStatus::Completed
    }
}

/// Pluggable external analyzer. Implementations must not fail.
#[async_trait]
pub trait ExternalAnalyzer: Send + Sync {
    async fn analyze(&self, job_text: &str, resume_text: &str) -> ExternalAnalysis;
}

/// Analyzer backed by the remote LLM.
pub struct LlmAnalyzer {
    llm: LlmClient,
}

impl LlmAnalyzer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ExternalAnalyzer for LlmAnalyzer {
    async fn analyze(&self, job_text: &str, resume_text: &str) -> ExternalAnalysis {
        if !self.llm.has_api_key() {
            info!("No LLM API key configured; skipping external analysis");
            return ExternalAnalysis::local_fallback();
        }

        let prompt = resume_analysis_prompt(job_text, resume_text);
        match self.llm.complete(&prompt).await {
            Ok(completion) => parse_analysis(&completion.text, &completion.raw_body),
            Err(LlmError::MissingApiKey) => ExternalAnalysis::local_fallback(),
            Err(e) => {
                error!("LLM analysis request failed: {e}");
                ExternalAnalysis::failed(&e)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    match_score: Option<Value>,
    #[serde(default)]
    missing_skills: Option<Value>,
    #[serde(default)]
    feedback: Option<Value>,
}

/// Parses the model's answer. Non-JSON answers degrade to `Unparsed` with the
/// raw text (or, if empty, the raw response body) as feedback.
pub fn parse_analysis(text: &str, raw_body: &str) -> ExternalAnalysis {
    let cleaned = strip_json_fences(text);
    match serde_json::from_str::<RawAnalysis>(cleaned) {
        Ok(raw) => ExternalAnalysis {
            match_score: raw.match_score.as_ref().and_then(coerce_score),
            missing_skills: raw
                .missing_skills
                .as_ref()
                .map(coerce_string_list)
                .unwrap_or_default(),
            feedback: match raw.feedback {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
            status: AnalysisStatus::Completed,
        },
        Err(e) => {
            warn!("LLM answer was not valid JSON: {e}");
            let source = if text.trim().is_empty() { raw_body } else { text };
            ExternalAnalysis {
                match_score: None,
                missing_skills: vec![],
                feedback: truncate_chars(source, MAX_RAW_FEEDBACK_CHARS),
                status: AnalysisStatus::Unparsed,
            }
        }
    }
}

/// Accepts integers, floats and numeric strings; clamps into 0–100.
fn coerce_score(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }?;
    number
        .is_finite()
        .then(|| number.round().clamp(0.0, 100.0) as i64)
}

fn coerce_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => vec![],
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm_client::{DEFAULT_API_BASE, DEFAULT_MODEL};

    #[test]
    fn test_parses_fenced_json_answer() {
        let text = "```json\n{\"match_score\": 82, \"missing_skills\": [\"Docker\"], \"feedback\": \"Add containers\"}\n```";
        let analysis = parse_analysis(text, "");
        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.match_score, Some(82));
        assert_eq!(analysis.missing_skills, vec!["Docker"]);
        assert_eq!(analysis.feedback, "Add containers");
    }

    #[test]
    fn test_non_json_answer_degrades_to_raw_feedback() {
        let analysis = parse_analysis("The candidate looks strong overall.", "{}");
        assert_eq!(analysis.status, AnalysisStatus::Unparsed);
        assert_eq!(analysis.match_score, None);
        assert!(analysis.missing_skills.is_empty());
        assert_eq!(analysis.feedback, "The candidate looks strong overall.");
    }

    #[test]
    fn test_raw_feedback_is_truncated() {
        let long = "x".repeat(5000);
        let analysis = parse_analysis(&long, "");
        assert_eq!(analysis.feedback.chars().count(), MAX_RAW_FEEDBACK_CHARS);
    }

    #[test]
    fn test_empty_answer_falls_back_to_raw_body() {
        let analysis = parse_analysis("", "{\"candidates\":[]}");
        assert_eq!(analysis.status, AnalysisStatus::Unparsed);
        assert_eq!(analysis.feedback, "{\"candidates\":[]}");
    }

    #[test]
    fn test_score_coercion() {
        assert_eq!(coerce_score(&serde_json::json!(77.6)), Some(78));
        assert_eq!(coerce_score(&serde_json::json!("64")), Some(64));
        assert_eq!(coerce_score(&serde_json::json!("90%")), Some(90));
        assert_eq!(coerce_score(&serde_json::json!(140)), Some(100));
        assert_eq!(coerce_score(&serde_json::json!(-3)), Some(0));
        assert_eq!(coerce_score(&serde_json::json!(null)), None);
        assert_eq!(coerce_score(&serde_json::json!("high")), None);
    }

    #[test]
    fn test_null_score_and_missing_fields_parse() {
        let analysis = parse_analysis("{\"match_score\": null}", "");
        assert_eq!(analysis.status, AnalysisStatus::Completed);
        assert_eq!(analysis.match_score, None);
        assert!(analysis.missing_skills.is_empty());
        assert_eq!(analysis.feedback, "");
    }

    #[tokio::test]
    async fn test_no_api_key_returns_local_fallback_sentinel() {
        let llm = LlmClient::new(
            None,
            DEFAULT_API_BASE.to_string(),
            DEFAULT_MODEL.to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        let analysis = LlmAnalyzer::new(llm).analyze("job", "resume").await;
        assert_eq!(analysis.status, AnalysisStatus::LocalFallback);
        assert_eq!(analysis.match_score, None);
        assert!(analysis.feedback.contains("No LLM API key"));
    }

    #[tokio::test]
    async fn test_timeout_degrades_with_error_indicator() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let llm = LlmClient::new(
            Some("test-key".to_string()),
            format!("http://{addr}"),
            DEFAULT_MODEL.to_string(),
            Duration::from_millis(200),
        )
        .unwrap();
        let analysis = LlmAnalyzer::new(llm).analyze("job", "resume").await;
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert_eq!(analysis.match_score, None);
        assert!(analysis.missing_skills.is_empty());
        assert!(analysis.feedback.contains("LLM API error"));
        assert!(analysis.feedback.contains("timeout"));
    }
}
