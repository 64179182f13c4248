// Candidate-to-job scoring core.
// Keyword extraction, lexical + semantic matching, external LLM analysis and
// weighted aggregation. Nothing in here touches the database.

pub mod aggregate;
pub mod embedding;
pub mod external;
pub mod handlers;
pub mod keywords;
pub mod lexical;
pub mod pipeline;
pub mod prompts;
pub mod semantic;

/// Score substituted whenever a signal cannot be computed.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Result of a collaborator call that is not allowed to fail.
///
/// `Degraded` carries the reason; callers substitute the documented default.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(String),
}

impl<T> Outcome<T> {
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Degraded(_) => default,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }
}

/// Rounds to two decimal places, the precision every stored score uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(79.994), 79.99);
    }

    #[test]
    fn test_outcome_unwrap_or_substitutes_on_degraded() {
        let ok: Outcome<f64> = Outcome::Ok(72.5);
        let degraded: Outcome<f64> = Outcome::Degraded("backend down".to_string());
        assert_eq!(ok.unwrap_or(NEUTRAL_SCORE), 72.5);
        assert!(degraded.is_degraded());
        assert_eq!(degraded.unwrap_or(NEUTRAL_SCORE), NEUTRAL_SCORE);
    }
}
