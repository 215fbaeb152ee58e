//! Snapshots and history entries

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::ProjectBreakdown;
use crate::eval::SuiteResult;

/// Tracked file contents and breakdown captured at an iteration boundary
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSnapshot {
    pub iteration: u32,
    /// Path -> full content
    pub files: BTreeMap<String, String>,
    pub breakdown: ProjectBreakdown,
    pub captured_at: DateTime<Utc>,
}

/// Permanent record of one completed iteration
#[derive(Debug, Clone, PartialEq)]
pub struct IterationHistoryEntry {
    pub iteration: u32,
    pub changelog: String,
    pub result: SuiteResult,
    /// Iteration whose snapshot was restored during this iteration
    pub reset_from: Option<u32>,
    pub reset_reason: Option<String>,
}

impl IterationHistoryEntry {
    pub fn new(iteration: u32, changelog: impl Into<String>, result: SuiteResult, rollback: Option<PendingRollback>) -> Self {
        let (reset_from, reset_reason) = match rollback {
            Some(r) => (Some(r.from_iteration), Some(r.reason)),
            None => (None, None),
        };
        Self {
            iteration,
            changelog: changelog.into(),
            result,
            reset_from,
            reset_reason,
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.result.accuracy()
    }

    /// Markdown block shown in the optimisation history
    pub fn to_str(&self) -> String {
        let mut out = format!("### Iteration {}\n", self.iteration);

        if let Some(from) = self.reset_from {
            out.push_str(&format!("**Reset**: Rolled back to iteration {} state", from));
            if let Some(reason) = self.reset_reason.as_deref().filter(|r| !r.is_empty()) {
                out.push_str(&format!(" (reason: \"{}\")", reason));
            }
            out.push('\n');
        }

        out.push_str(&format!("**Changes**: {}\n\n", self.changelog));
        out.push_str("**Results**:\n");
        out.push_str(&self.result.score_lines());
        out.push('\n');
        out
    }
}

/// A rollback waiting to be attached to the next completed iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRollback {
    pub from_iteration: u32,
    pub reason: String,
}

/// Log entry kept for every rollback performed during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRecord {
    pub target: u32,
    pub reason: String,
    /// Iteration in progress when the rollback happened
    pub during_iteration: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalAttempt, EvalResult};
    use serde_json::Value;

    fn suite() -> SuiteResult {
        SuiteResult::new(vec![EvalResult {
            eval_name: "dates".to_string(),
            eval_desc: String::new(),
            attempts: vec![EvalAttempt {
                attempt_number: 1,
                score: 1.0,
                payload: Value::Null,
                trajectory: vec![],
                hidden_payload: None,
                is_correct: true,
            }],
            threshold: 1.0,
        }])
    }

    #[test]
    fn test_to_str_plain() {
        let entry = IterationHistoryEntry::new(2, "Tightened the date prompt", suite(), None);
        assert_eq!(
            entry.to_str(),
            "### Iteration 2\n**Changes**: Tightened the date prompt\n\n**Results**:\n- dates: PASS (Score: 100.0%)\n**Total**: 100.0% (1/1 passed)\n\n"
        );
    }

    #[test]
    fn test_to_str_with_reset() {
        let rollback = PendingRollback {
            from_iteration: 1,
            reason: "iteration 2 broke parsing".to_string(),
        };
        let entry = IterationHistoryEntry::new(3, "Retry", suite(), Some(rollback));
        assert!(
            entry
                .to_str()
                .contains("**Reset**: Rolled back to iteration 1 state (reason: \"iteration 2 broke parsing\")\n")
        );
        assert_eq!(entry.reset_from, Some(1));
    }
}
