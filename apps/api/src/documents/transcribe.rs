//! Video transcription collaborator.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a media file into text. Returns an empty string when transcription
/// is unavailable or fails; never errors.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media_path: &Path) -> String;
}

/// Used when no transcription backend is configured.
pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _media_path: &Path) -> String {
        String::new()
    }
}

/// OpenAI-compatible `/audio/transcriptions` client.
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl HttpTranscriber {
    pub fn new(url: String, api_key: Option<String>, model: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()?,
            url,
            api_key,
            model,
        })
    }

    async fn request(&self, media_path: &Path) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(media_path).await?;
        let file_name = media_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranscribeError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, media_path: &Path) -> String {
        match self.request(media_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Transcription failed, continuing without transcript: {e}");
                String::new()
            }
        }
    }
}

/// Picks the backend from configuration.
pub fn build_transcriber(config: &Config) -> anyhow::Result<Arc<dyn Transcriber>> {
    match &config.transcription_api_url {
        Some(url) => {
            info!("Transcription enabled (model: {})", config.transcription_model);
            Ok(Arc::new(HttpTranscriber::new(
                url.clone(),
                config.transcription_api_key.clone(),
                config.transcription_model.clone(),
            )?))
        }
        None => {
            info!("Transcription disabled: TRANSCRIPTION_API_URL not set");
            Ok(Arc::new(DisabledTranscriber))
        }
    }
}

/// Spools uploaded media to a temporary file and transcribes it. The file is
/// removed when this returns.
pub async fn transcribe_upload(
    transcriber: &dyn Transcriber,
    filename: &str,
    bytes: &[u8],
) -> String {
    let suffix = Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let spooled = match tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            warn!("Could not create temp file for {filename}: {e}");
            return String::new();
        }
    };
    if let Err(e) = tokio::fs::write(spooled.path(), bytes).await {
        warn!("Could not spool {filename} to disk: {e}");
        return String::new();
    }

    transcriber.transcribe(spooled.path()).await
}
