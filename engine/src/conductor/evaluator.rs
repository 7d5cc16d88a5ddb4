//! Watcher node: reviews the last expert output and issues a verdict.

use super::state::WatcherStatus;
use crate::agent::Worker;
use crate::llm::structured::parse_structured;
use sdk::errors::EngineError;
use serde_json::Value;
use tracing::{info, warn};

pub const NO_FEEDBACK: &str = "No feedback provided.";
pub const UNPARSEABLE: &str = "Watcher output unparseable, defaulting to PASS.";
pub const INTERRUPTED_FEEDBACK: &str = "Watcher interrupted by user.";

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: WatcherStatus,
    pub feedback: String,
}

/// Read `{status, feedback}` out of the Watcher's reply.
///
/// A missing or unknown status counts as PASS, as does a reply that cannot be
/// parsed at all.
pub fn parse_verdict(text: &str) -> Verdict {
    let map = match parse_structured(text) {
        Ok(map) => map,
        Err(e) => {
            warn!("Watcher reply is not JSON: {}", e);
            return Verdict {
                status: WatcherStatus::Pass,
                feedback: UNPARSEABLE.to_string(),
            };
        }
    };

    let status = map
        .get("status")
        .and_then(Value::as_str)
        .and_then(WatcherStatus::parse)
        .filter(|s| *s != WatcherStatus::Interrupted)
        .unwrap_or(WatcherStatus::Pass);

    let feedback = match map.get("feedback") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Null) | None => NO_FEEDBACK.to_string(),
        Some(Value::String(_)) => NO_FEEDBACK.to_string(),
        Some(other) => other.to_string(),
    };

    Verdict { status, feedback }
}

pub struct Evaluator {
    watcher: Worker,
}

impl Evaluator {
    pub fn new(watcher: Worker) -> Self {
        Self { watcher }
    }

    pub fn watcher(&self) -> &Worker {
        &self.watcher
    }

    /// Review `output`; an interruption becomes an INTERRUPTED verdict
    pub async fn review(&self, output: &str) -> Result<Verdict, EngineError> {
        info!("Watcher reviewing output");
        let reply = match self
            .watcher
            .run_task(&format!("Review this output: {}", output))
            .await
        {
            Ok(reply) => reply,
            Err(EngineError::Interrupted) => {
                return Ok(Verdict {
                    status: WatcherStatus::Interrupted,
                    feedback: INTERRUPTED_FEEDBACK.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let verdict = parse_verdict(&reply);
        info!("Watcher verdict: {} - {}", verdict.status, verdict.feedback);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_fail_verdict() {
        let verdict = parse_verdict(
            "```json\n{\"status\": \"FAIL\", \"feedback\": \"price still has nulls\"}\n```",
        );
        assert_eq!(verdict.status, WatcherStatus::Fail);
        assert_eq!(verdict.feedback, "price still has nulls");
    }

    #[test]
    fn test_retry_is_fail() {
        let verdict = parse_verdict(r#"{"status": "retry", "feedback": "again"}"#);
        assert_eq!(verdict.status, WatcherStatus::Fail);
    }

    #[test]
    fn test_missing_fields_default() {
        let verdict = parse_verdict(r#"{"status": "WARN"}"#);
        assert_eq!(verdict.status, WatcherStatus::Warn);
        assert_eq!(verdict.feedback, NO_FEEDBACK);

        let verdict = parse_verdict(r#"{"feedback": "looks fine"}"#);
        assert_eq!(verdict.status, WatcherStatus::Pass);
    }

    #[test]
    fn test_prose_defaults_to_pass() {
        let verdict = parse_verdict("Everything looks great to me!");
        assert_eq!(verdict.status, WatcherStatus::Pass);
        assert_eq!(verdict.feedback, UNPARSEABLE);
    }

    #[test]
    fn test_model_cannot_claim_interrupted() {
        let verdict = parse_verdict(r#"{"status": "INTERRUPTED", "feedback": "x"}"#);
        assert_eq!(verdict.status, WatcherStatus::Pass);
    }
}
