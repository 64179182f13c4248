use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::screening::aggregate::{AggregationMode, DEFAULT_KEYWORD_WEIGHT};
use crate::screening::keywords::DEFAULT_TOP_N;

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_EMBEDDING_BACKEND: EmbeddingBackend = EmbeddingBackend::FastEmbed;

/// Which embedding backend the semantic matcher runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Local all-MiniLM-L6-v2 via fastembed (default feature `fastembed`).
    FastEmbed,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
    /// Deterministic feature hashing; no model download. Offline opt-in only.
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fastembed" => Ok(EmbeddingBackend::FastEmbed),
            "http" => Ok(EmbeddingBackend::Http),
            "hash" => Ok(EmbeddingBackend::Hash),
            other => Err(anyhow!(
                "unknown embedding backend '{other}' (expected fastembed, http or hash)"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Unset or blank means the external analyzer runs in local-fallback mode.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub llm_timeout: Duration,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_api_url: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub transcription_api_url: Option<String>,
    pub transcription_api_key: Option<String>,
    pub transcription_model: String,
    pub scoring_mode: AggregationMode,
    pub keyword_weight: f64,
    pub keyword_top_n: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: optional_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: optional_env("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 30u64)?),
            embedding_backend: parse_env("EMBEDDING_BACKEND", DEFAULT_EMBEDDING_BACKEND)?,
            embedding_api_url: optional_env("EMBEDDING_API_URL"),
            embedding_api_key: optional_env("EMBEDDING_API_KEY"),
            embedding_model: optional_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            transcription_api_url: optional_env("TRANSCRIPTION_API_URL"),
            transcription_api_key: optional_env("TRANSCRIPTION_API_KEY"),
            transcription_model: optional_env("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            scoring_mode: parse_env("SCORING_MODE", AggregationMode::default())?,
            keyword_weight: parse_env("KEYWORD_WEIGHT", DEFAULT_KEYWORD_WEIGHT)?,
            keyword_top_n: parse_env("KEYWORD_TOP_N", DEFAULT_TOP_N)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Set and non-blank, trimmed.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow!("{key} has invalid value '{raw}': {e}"))
}
