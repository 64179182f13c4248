//! Sentence-embedding backends behind one trait.
//!
//! The selected backend is built once at startup and parked in a process-wide
//! `OnceLock`; every scoring call shares that instance read-only.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::config::{Config, EmbeddingBackend};

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedderInfo {
    pub name: String,
    pub dimension: usize,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn info(&self) -> EmbedderInfo;

    /// Embeds every text; the output has one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

static SHARED_EMBEDDER: OnceLock<Arc<dyn Embedder>> = OnceLock::new();

/// Installs the process-wide embedder. The first call wins; later calls
/// return the already-installed instance.
pub fn install_shared(embedder: Arc<dyn Embedder>) -> Arc<dyn Embedder> {
    SHARED_EMBEDDER.get_or_init(|| embedder).clone()
}

/// Builds the backend named by the configuration. Model loading happens here,
/// never on the scoring path.
pub fn load_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding_backend {
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::default()),
        EmbeddingBackend::Http => {
            let url = config.embedding_api_url.clone().ok_or_else(|| {
                anyhow::anyhow!("EMBEDDING_API_URL is required for the http embedding backend")
            })?;
            Arc::new(HttpEmbedder::new(
                url,
                config.embedding_api_key.clone(),
                config.embedding_model.clone(),
            )?)
        }
        #[cfg(feature = "fastembed")]
        EmbeddingBackend::FastEmbed => Arc::new(FastEmbedEmbedder::load()?),
        #[cfg(not(feature = "fastembed"))]
        EmbeddingBackend::FastEmbed => {
            anyhow::bail!(
                "EMBEDDING_BACKEND=fastembed requires the fastembed feature; \
                 rebuild with default features or pick http/hash"
            )
        }
    };

    let info = embedder.info();
    info!(
        "Embedding model loaded: {} ({} dims)",
        info.name, info.dimension
    );
    Ok(embedder)
}

// ────────────────────────────────────────────────────────────────────────────
// HashEmbedder: deterministic, dependency-free
// ────────────────────────────────────────────────────────────────────────────

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001B3;

/// FNV-1a feature hashing over character n-grams. Not a language model: only
/// for offline runs (`EMBEDDING_BACKEND=hash`) and as the test stub.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    ngram_range: (usize, usize),
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            ngram_range: (3, 4),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            if n > chars.len() {
                continue;
            }
            for window in chars.windows(n) {
                let ngram: String = window.iter().collect();
                let h = fnv1a(ngram.as_bytes());
                let bucket = (h as usize) % self.dimension;
                let sign = if (h >> 32) & 1 == 0 { 1.0f32 } else { -1.0f32 };
                vector[bucket] += sign;
            }
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: format!("fnv1a-hash-{}", self.dimension),
            dimension: self.dimension,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HttpEmbedder: OpenAI-compatible /embeddings endpoint
// ────────────────────────────────────────────────────────────────────────────

pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpEmbedder {
    pub fn new(url: String, api_key: Option<String>, model: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: format!("http-{}", self.model),
            dimension: 0,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = json!({ "model": self.model, "input": texts });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let json: Value = request.send().await?.error_for_status()?.json().await?;
        let vectors = parse_embedding_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| EmbedError::InvalidResponse("missing data array".to_string()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(fallback_index);
        let values = item
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| EmbedError::InvalidResponse("item missing embedding".to_string()))?;
        let vector = values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|n| n as f32)
                    .ok_or_else(|| EmbedError::InvalidResponse("non-numeric value".to_string()))
            })
            .collect::<Result<Vec<f32>, _>>()?;
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ────────────────────────────────────────────────────────────────────────────
// FastEmbedEmbedder: local all-MiniLM-L6-v2 via ONNX Runtime
// ────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "fastembed")]
pub struct FastEmbedEmbedder {
    model: Arc<fastembed::TextEmbedding>,
}

#[cfg(feature = "fastembed")]
impl FastEmbedEmbedder {
    pub fn load() -> anyhow::Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[cfg(feature = "fastembed")]
#[async_trait]
impl Embedder for FastEmbedEmbedder {
    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            name: "fastembed-all-MiniLM-L6-v2".to_string(),
            dimension: 384,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| EmbedError::Inference(e.to_string()))?
            .map_err(|e| EmbedError::Inference(e.to_string()))
    }
}
