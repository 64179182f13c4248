//! Scoring pipeline: runs every matcher and folds the results into a
//! `ScoreCard`.
//!
//! Flow: (lexical + keyword boost) ∥ semantic ∥ external → aggregate → verdict.
//! The three branches share no state, so they run concurrently; the lexical
//! branch is CPU-bound and runs on the blocking pool.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::screening::aggregate::{
    local_feedback, AggregationMode, KeywordBoost, ScoreAggregator, Signals, Verdict,
};
use crate::screening::external::{AnalysisStatus, ExternalAnalysis, ExternalAnalyzer};
use crate::screening::lexical::{self, LexicalMatch};
use crate::screening::semantic::SemanticMatcher;

/// Every derived scoring field for one resume/job comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub mode: AggregationMode,
    pub lexical_score: f64,
    pub semantic_score: f64,
    pub external_score: Option<f64>,
    /// Only set in four-signal mode.
    pub local_score: Option<f64>,
    pub keyword_boost: f64,
    pub matched_keywords: Vec<String>,
    pub final_score: Option<f64>,
    pub missing_skills: Vec<String>,
    pub feedback: String,
    pub verdict: Verdict,
    /// `None` when the mode does not consult the external analyzer.
    pub external_status: Option<AnalysisStatus>,
}

#[derive(Clone)]
pub struct ScoringPipeline {
    semantic: SemanticMatcher,
    analyzer: Arc<dyn ExternalAnalyzer>,
    aggregator: ScoreAggregator,
}

impl ScoringPipeline {
    pub fn new(
        semantic: SemanticMatcher,
        analyzer: Arc<dyn ExternalAnalyzer>,
        aggregator: ScoreAggregator,
    ) -> Self {
        Self {
            semantic,
            analyzer,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &ScoreAggregator {
        &self.aggregator
    }

    /// Scores with the configured aggregation mode.
    pub async fn score(
        &self,
        job_text: &str,
        job_skills: &[String],
        resume_text: &str,
    ) -> ScoreCard {
        self.score_with_mode(self.aggregator.mode, job_text, job_skills, resume_text)
            .await
    }

    /// Scores with an explicit aggregation mode. Never fails.
    pub async fn score_with_mode(
        &self,
        mode: AggregationMode,
        job_text: &str,
        job_skills: &[String],
        resume_text: &str,
    ) -> ScoreCard {
        let aggregator = ScoreAggregator {
            mode,
            ..self.aggregator.clone()
        };

        let lexical_task = {
            let skills = job_skills.to_vec();
            let job = job_text.to_string();
            let resume = resume_text.to_string();
            let aggregator = aggregator.clone();
            tokio::task::spawn_blocking(move || {
                let lexical = lexical::score(&skills, &resume);
                let boost = aggregator.keyword_boost(&job, &resume);
                (lexical, boost)
            })
        };

        let (lexical_result, semantic_score, external) = if mode.uses_external() {
            let (lexical, semantic, external) = tokio::join!(
                lexical_task,
                self.semantic.score(job_text, resume_text),
                self.analyzer.analyze(job_text, resume_text)
            );
            (lexical, semantic, Some(external))
        } else {
            let (lexical, semantic) =
                tokio::join!(lexical_task, self.semantic.score(job_text, resume_text));
            (lexical, semantic, None)
        };

        let (lexical, boost) = lexical_result.unwrap_or_else(|e| {
            warn!("Lexical scoring task failed, counting every skill as missing: {e}");
            let missing = LexicalMatch {
                score: 0.0,
                present: vec![],
                missing: job_skills.to_vec(),
            };
            (missing, KeywordBoost::default())
        });

        let external_score = external
            .as_ref()
            .and_then(|e| e.match_score)
            .map(|s| s as f64);

        let final_score = aggregator.aggregate(&Signals {
            lexical: lexical.score,
            semantic: semantic_score,
            external: external_score,
            keyword_boost: boost.boost,
        });
        let local_score = mode
            .uses_external()
            .then(|| aggregator.local_score(lexical.score, semantic_score))
            .flatten();

        let (missing_skills, feedback) = match &external {
            Some(analysis) => merge_external_findings(analysis, lexical.missing, final_score),
            None => {
                let feedback = local_feedback(final_score, &lexical.missing);
                (lexical.missing, feedback)
            }
        };

        let verdict = Verdict::from_score(final_score);
        info!(
            "Scored resume: mode={} lexical={} semantic={} external={:?} boost={} final={:?} \
             verdict={}",
            mode.as_str(),
            lexical.score,
            semantic_score,
            external_score,
            boost.boost,
            final_score,
            verdict
        );

        ScoreCard {
            mode,
            lexical_score: lexical.score,
            semantic_score,
            external_score,
            local_score,
            keyword_boost: boost.boost,
            matched_keywords: boost.matched,
            final_score,
            missing_skills,
            feedback,
            verdict,
            external_status: external.map(|e| e.status),
        }
    }
}

/// A completed analysis supplies missing skills and feedback; a degraded one
/// keeps the lexical gaps and its own explanatory feedback.
fn merge_external_findings(
    analysis: &ExternalAnalysis,
    lexical_missing: Vec<String>,
    final_score: Option<f64>,
) -> (Vec<String>, String) {
    if analysis.is_degraded() {
        return (lexical_missing, analysis.feedback.clone());
    }
    let missing = if analysis.missing_skills.is_empty() {
        lexical_missing
    } else {
        analysis.missing_skills.clone()
    };
    let feedback = if analysis.feedback.trim().is_empty() {
        local_feedback(final_score, &missing)
    } else {
        analysis.feedback.clone()
    };
    (missing, feedback)
}
