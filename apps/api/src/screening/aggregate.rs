//! Score aggregation: combines the individual signals into one final score
//! and maps it onto a verdict.
//!
//! Two weighting schemes:
//! - `TwoSignal`:  final = 0.6·lexical + 0.4·semantic
//! - `FourSignal`: final = 0.4·local + 0.4·external + 0.2·keyword_boost,
//!   local = 0.5·lexical + 0.5·semantic
//!
//! The keyword boost is count × weight and is not capped, so a four-signal
//! score can exceed 100.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::screening::keywords::{extract_top_keywords, DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS};
use crate::screening::round2;

pub const DEFAULT_KEYWORD_WEIGHT: f64 = 5.0;

const TWO_SIGNAL_LEXICAL: f64 = 0.6;
const TWO_SIGNAL_SEMANTIC: f64 = 0.4;
const FOUR_SIGNAL_LOCAL: f64 = 0.4;
const FOUR_SIGNAL_EXTERNAL: f64 = 0.4;
const FOUR_SIGNAL_BOOST: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    TwoSignal,
    #[default]
    FourSignal,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::TwoSignal => "two_signal",
            AggregationMode::FourSignal => "four_signal",
        }
    }

    /// Whether this scheme consumes the external analyzer.
    pub fn uses_external(&self) -> bool {
        matches!(self, AggregationMode::FourSignal)
    }
}

impl FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "two_signal" | "two-signal" | "two" => Ok(AggregationMode::TwoSignal),
            "four_signal" | "four-signal" | "four" => Ok(AggregationMode::FourSignal),
            other => Err(format!("unknown scoring mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    High,
    Medium,
    Low,
    Unknown,
}

impl Verdict {
    /// `>= 80` High, `>= 55` Medium, otherwise Low; no score is Unknown.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s.is_nan() => Verdict::Unknown,
            Some(s) if s >= 80.0 => Verdict::High,
            Some(s) if s >= 55.0 => Verdict::Medium,
            Some(_) => Verdict::Low,
            None => Verdict::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::High => "High",
            Verdict::Medium => "Medium",
            Verdict::Low => "Low",
            Verdict::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Verdict::High),
            "Medium" => Ok(Verdict::Medium),
            "Low" => Ok(Verdict::Low),
            "Unknown" => Ok(Verdict::Unknown),
            other => Err(format!("unknown verdict '{other}'")),
        }
    }
}

/// Signals fed into the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub lexical: f64,
    pub semantic: f64,
    /// `None` when the external analyzer produced no number; counts as 0.
    pub external: Option<f64>,
    pub keyword_boost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordBoost {
    pub boost: f64,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    pub mode: AggregationMode,
    pub keyword_weight: f64,
    pub top_n: usize,
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self {
            mode: AggregationMode::default(),
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            top_n: crate::screening::keywords::DEFAULT_TOP_N,
        }
    }
}

impl ScoreAggregator {
    pub fn new(mode: AggregationMode, keyword_weight: f64, top_n: usize) -> Self {
        Self {
            mode,
            keyword_weight,
            top_n,
        }
    }

    /// Counts the job's top-N keywords that appear verbatim in the resume.
    pub fn keyword_boost(&self, job_text: &str, resume_text: &str) -> KeywordBoost {
        let resume = resume_text.to_lowercase();
        let matched: Vec<String> =
            extract_top_keywords(job_text, DEFAULT_MIN_WORDS, DEFAULT_MAX_WORDS, self.top_n)
                .into_iter()
                .filter(|kw| resume.contains(kw.as_str()))
                .collect();
        KeywordBoost {
            boost: round2(matched.len() as f64 * self.keyword_weight),
            matched,
        }
    }

    /// 0.5·lexical + 0.5·semantic; `None` on a non-finite input.
    pub fn local_score(&self, lexical: f64, semantic: f64) -> Option<f64> {
        finite(round2(0.5 * lexical + 0.5 * semantic))
    }

    /// Final score under the configured mode; `None` if any consumed signal
    /// is not a finite number.
    pub fn aggregate(&self, signals: &Signals) -> Option<f64> {
        match self.mode {
            AggregationMode::TwoSignal => finite(round2(
                TWO_SIGNAL_LEXICAL * signals.lexical + TWO_SIGNAL_SEMANTIC * signals.semantic,
            )),
            AggregationMode::FourSignal => {
                let local = self.local_score(signals.lexical, signals.semantic)?;
                let external = finite(signals.external.unwrap_or(0.0))?;
                let boost = finite(signals.keyword_boost)?;
                finite(round2(
                    FOUR_SIGNAL_LOCAL * local
                        + FOUR_SIGNAL_EXTERNAL * external
                        + FOUR_SIGNAL_BOOST * boost,
                ))
            }
        }
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Human-readable feedback when no external analysis is available.
pub fn local_feedback(score: Option<f64>, missing: &[String]) -> String {
    let top_gaps: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();

    match score {
        None => "Score could not be computed from the available signals.".to_string(),
        Some(s) if s >= 80.0 => {
            "Strong match. The resume covers the key job requirements.".to_string()
        }
        Some(s) if top_gaps.is_empty() => {
            format!("Partial match ({s:.2}/100). Strengthen how experience is described.")
        }
        Some(s) if s >= 55.0 => format!(
            "Moderate match ({s:.2}/100). Consider adding evidence for: {}.",
            top_gaps.join(", ")
        ),
        Some(s) => format!(
            "Low match ({s:.2}/100). Significant gaps: {}.",
            top_gaps.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two() -> ScoreAggregator {
        ScoreAggregator::new(AggregationMode::TwoSignal, 5.0, 20)
    }

    fn four() -> ScoreAggregator {
        ScoreAggregator::new(AggregationMode::FourSignal, 5.0, 20)
    }

    #[test]
    fn test_verdict_boundaries() {
        assert_eq!(Verdict::from_score(Some(79.99)), Verdict::Medium);
        assert_eq!(Verdict::from_score(Some(80.0)), Verdict::High);
        assert_eq!(Verdict::from_score(Some(54.99)), Verdict::Low);
        assert_eq!(Verdict::from_score(Some(55.0)), Verdict::Medium);
        assert_eq!(Verdict::from_score(None), Verdict::Unknown);
        assert_eq!(Verdict::from_score(Some(f64::NAN)), Verdict::Unknown);
    }

    #[test]
    fn test_verdict_round_trips_through_str() {
        for v in [Verdict::High, Verdict::Medium, Verdict::Low, Verdict::Unknown] {
            assert_eq!(v.as_str().parse::<Verdict>().unwrap(), v);
        }
    }

    #[test]
    fn test_two_signal_weights() {
        let signals = Signals {
            lexical: 66.67,
            semantic: 80.0,
            external: None,
            keyword_boost: 0.0,
        };
        // 0.6*66.67 + 0.4*80 = 40.002 + 32 = 72.002
        assert_eq!(two().aggregate(&signals), Some(72.0));
    }

    #[test]
    fn test_two_signal_stays_in_range() {
        for (lexical, semantic) in [(0.0, 0.0), (100.0, 100.0), (50.0, 12.5)] {
            let s = Signals {
                lexical,
                semantic,
                external: None,
                keyword_boost: 999.0,
            };
            let score = two().aggregate(&s).unwrap();
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn test_four_signal_weights() {
        let signals = Signals {
            lexical: 60.0,
            semantic: 80.0,
            external: Some(90.0),
            keyword_boost: 15.0,
        };
        // local = 70; 0.4*70 + 0.4*90 + 0.2*15 = 28 + 36 + 3 = 67
        assert_eq!(four().aggregate(&signals), Some(67.0));
    }

    #[test]
    fn test_four_signal_without_external_uses_local_and_boost() {
        let signals = Signals {
            lexical: 100.0,
            semantic: 50.0,
            external: None,
            keyword_boost: 10.0,
        };
        // local = 75; 0.4*75 + 0 + 0.2*10 = 32
        assert_eq!(four().aggregate(&signals), Some(32.0));
    }

    #[test]
    fn test_four_signal_is_not_clamped() {
        let signals = Signals {
            lexical: 100.0,
            semantic: 100.0,
            external: Some(100.0),
            keyword_boost: 200.0,
        };
        assert_eq!(four().aggregate(&signals), Some(120.0));
    }

    #[test]
    fn test_non_finite_signal_degrades_to_none() {
        let signals = Signals {
            lexical: f64::NAN,
            semantic: 50.0,
            external: Some(50.0),
            keyword_boost: 0.0,
        };
        assert_eq!(two().aggregate(&signals), None);
        assert_eq!(four().aggregate(&signals), None);

        let bad_external = Signals {
            lexical: 50.0,
            semantic: 50.0,
            external: Some(f64::INFINITY),
            keyword_boost: 0.0,
        };
        assert_eq!(four().aggregate(&bad_external), None);
        assert!(two().aggregate(&bad_external).is_some());
    }

    #[test]
    fn test_keyword_boost_counts_verbatim_matches() {
        let boost = four().keyword_boost(
            "Python, SQL, Docker, Kubernetes",
            "Python developer, strong SQL, no containers",
        );
        assert_eq!(boost.matched, vec!["python", "sql"]);
        assert_eq!(boost.boost, 10.0);
    }

    #[test]
    fn test_keyword_boost_does_not_accumulate() {
        let agg = four();
        let first = agg.keyword_boost("python, sql", "python sql");
        let second = agg.keyword_boost("python, sql", "python sql");
        assert_eq!(first, second);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "two_signal".parse::<AggregationMode>().unwrap(),
            AggregationMode::TwoSignal
        );
        assert_eq!(
            "FOUR-SIGNAL".parse::<AggregationMode>().unwrap(),
            AggregationMode::FourSignal
        );
        assert!("three".parse::<AggregationMode>().is_err());
    }

    #[test]
    fn test_local_feedback_lists_top_gaps() {
        let missing = vec!["docker".to_string(), "kafka".to_string()];
        let feedback = local_feedback(Some(60.0), &missing);
        assert!(feedback.contains("docker"));
        assert!(feedback.contains("60.00"));
        assert!(local_feedback(Some(85.0), &missing).contains("Strong match"));
        assert!(local_feedback(Some(20.0), &missing).contains("Low match"));
    }
}
