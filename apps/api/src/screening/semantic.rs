//! Semantic matching: cosine similarity of job and resume embeddings,
//! mapped from [-1, 1] onto [0, 100].

use std::sync::Arc;

use tracing::warn;

use crate::screening::embedding::Embedder;
use crate::screening::{round2, Outcome, NEUTRAL_SCORE};

/// Added to the norm product so all-zero embeddings cannot divide by zero.
const NORM_EPSILON: f64 = 1e-12;

#[derive(Clone)]
pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
}

impl SemanticMatcher {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Similarity on the 0–100 scale, or `Degraded` when it cannot be computed.
    /// Empty input short-circuits without touching the embedder. Whitespace-only
    /// text counts as empty: it carries nothing to embed.
    pub async fn evaluate(&self, job_text: &str, resume_text: &str) -> Outcome<f64> {
        if job_text.trim().is_empty() || resume_text.trim().is_empty() {
            return Outcome::Degraded("job or resume text is empty".to_string());
        }

        let texts = vec![job_text.to_string(), resume_text.to_string()];
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Embedding backend failed, using neutral semantic score: {e}");
                return Outcome::Degraded(format!("embedding failed: {e}"));
            }
        };

        match vectors.as_slice() {
            [job, resume] if job.len() == resume.len() => {
                Outcome::Ok(similarity_to_score(cosine_similarity(job, resume)))
            }
            _ => {
                warn!("Embedding backend returned mismatched vectors");
                Outcome::Degraded("embedding shape mismatch".to_string())
            }
        }
    }

    /// Semantic score with the neutral default substituted on degradation.
    pub async fn score(&self, job_text: &str, resume_text: &str) -> f64 {
        self.evaluate(job_text, resume_text)
            .await
            .unwrap_or(NEUTRAL_SCORE)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    dot / (norm_a * norm_b + NORM_EPSILON)
}

/// Maps a cosine similarity onto 0–100, two decimals.
pub fn similarity_to_score(similarity: f64) -> f64 {
    round2((similarity.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::screening::embedding::{EmbedError, EmbedderInfo, HashEmbedder};

    /// Returns fixed vectors and counts calls.
    struct FixedEmbedder {
        vectors: Vec<Vec<f32>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn info(&self) -> EmbedderInfo {
            EmbedderInfo {
                name: "fixed".to_string(),
                dimension: 2,
            }
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vectors.clone())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn info(&self) -> EmbedderInfo {
            EmbedderInfo {
                name: "broken".to_string(),
                dimension: 0,
            }
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Inference("not loaded".to_string()))
        }
    }

    fn fixed(vectors: Vec<Vec<f32>>) -> Arc<FixedEmbedder> {
        Arc::new(FixedEmbedder {
            vectors,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_identical_vectors_score_100() {
        let matcher = SemanticMatcher::new(fixed(vec![vec![1.0, 0.0], vec![1.0, 0.0]]));
        assert_eq!(matcher.score("job", "resume").await, 100.0);
    }

    #[tokio::test]
    async fn test_orthogonal_vectors_score_50() {
        let matcher = SemanticMatcher::new(fixed(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
        assert_eq!(matcher.score("job", "resume").await, 50.0);
    }

    #[tokio::test]
    async fn test_opposite_vectors_score_0() {
        let matcher = SemanticMatcher::new(fixed(vec![vec![1.0, 0.0], vec![-1.0, 0.0]]));
        assert_eq!(matcher.score("job", "resume").await, 0.0);
    }

    #[tokio::test]
    async fn test_empty_text_is_neutral_without_embedding_call() {
        let embedder = fixed(vec![vec![1.0, 0.0], vec![1.0, 0.0]]);
        let matcher = SemanticMatcher::new(embedder.clone());
        assert_eq!(matcher.score("", "resume").await, 50.0);
        assert_eq!(matcher.score("job", "   ").await, 50.0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_vectors_do_not_divide_by_zero() {
        let matcher = SemanticMatcher::new(fixed(vec![vec![0.0, 0.0], vec![0.0, 0.0]]));
        assert_eq!(matcher.score("job", "resume").await, 50.0);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_neutral() {
        let matcher = SemanticMatcher::new(Arc::new(BrokenEmbedder));
        assert!(matcher.evaluate("job", "resume").await.is_degraded());
        assert_eq!(matcher.score("job", "resume").await, 50.0);
    }

    #[tokio::test]
    async fn test_hash_embedder_scores_stay_in_range() {
        let matcher = SemanticMatcher::new(Arc::new(HashEmbedder::default()));
        let score = matcher
            .score("Senior Rust engineer, Kafka", "Backend developer with Rust and Kafka")
            .await;
        assert!((0.0..=100.0).contains(&score));
    }
}
