//! Evaluation results and the suite boundary
//!
//! A [`SuiteResult`] is what one run of the external evaluation suite
//! produces: per-eval attempts with a score, a correctness flag and an
//! arbitrary payload. Pass-rate arithmetic and the text rendering handed back
//! to the optimiser live here.

mod suite;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use suite::{CommandEvalSuite, EvalRequest, EvalRunner, EvalSuite};

#[cfg(test)]
pub use suite::mock;

/// One attempt of one eval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalAttempt {
    pub attempt_number: u32,
    /// Score in `0.0..=1.0`
    pub score: f64,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub trajectory: Vec<Value>,
    /// Details kept from the optimiser (never rendered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_payload: Option<Value>,
    #[serde(default)]
    pub is_correct: bool,
}

/// All attempts of one named eval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub eval_name: String,
    #[serde(default)]
    pub eval_desc: String,
    #[serde(default)]
    pub attempts: Vec<EvalAttempt>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    1.0
}

impl EvalResult {
    /// An eval passes when any of its attempts is correct
    pub fn is_correct(&self) -> bool {
        self.attempts.iter().any(|a| a.is_correct)
    }

    /// Mean attempt score, 0 when there are no attempts
    pub fn score(&self) -> f64 {
        if self.attempts.is_empty() {
            return 0.0;
        }
        self.attempts.iter().map(|a| a.score).sum::<f64>() / self.attempts.len() as f64
    }

    pub fn attempt(&self, number: u32) -> Option<&EvalAttempt> {
        self.attempts.iter().find(|a| a.attempt_number == number)
    }

    fn status(&self) -> &'static str {
        if self.is_correct() { "PASS" } else { "FAIL" }
    }

    /// `- name: PASS (Score: 87.5%)`
    pub fn score_line(&self) -> String {
        format!(
            "- {}: {} (Score: {:.1}%)",
            self.eval_name,
            self.status(),
            self.score() * 100.0
        )
    }
}

/// Aggregate counts over a suite result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub num_correct: usize,
    pub num_incorrect: usize,
    pub average_score: f64,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.num_correct + self.num_incorrect
    }

    /// Pass-rate in percent, 0 for an empty suite
    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.num_correct as f64 / self.total() as f64 * 100.0
    }

    /// `**Total**: 50.0% (1/2 passed)`
    pub fn total_line(&self) -> String {
        format!(
            "**Total**: {:.1}% ({}/{} passed)",
            self.accuracy(),
            self.num_correct,
            self.total()
        )
    }
}

/// Output of one evaluation suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    #[serde(default)]
    pub results: Vec<EvalResult>,
    /// Set by the suite to ask the optimiser to stop
    #[serde(default)]
    pub end_optimisation: bool,
}

impl SuiteResult {
    pub fn new(results: Vec<EvalResult>) -> Self {
        Self {
            results,
            end_optimisation: false,
        }
    }

    pub fn summarise(&self) -> Summary {
        let num_correct = self.results.iter().filter(|r| r.is_correct()).count();
        let total_score: f64 = self.results.iter().map(|r| r.score()).sum();
        let average_score = if self.results.is_empty() {
            0.0
        } else {
            total_score / self.results.len() as f64
        };

        Summary {
            num_correct,
            num_incorrect: self.results.len() - num_correct,
            average_score,
        }
    }

    /// Pass-rate in percent
    pub fn accuracy(&self) -> f64 {
        self.summarise().accuracy()
    }

    pub fn find(&self, eval_name: &str) -> Option<&EvalResult> {
        self.results.iter().find(|r| r.eval_name == eval_name)
    }

    /// Per-eval score lines followed by the total line
    pub fn score_lines(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            out.push_str(&result.score_line());
            out.push('\n');
        }
        out.push_str(&self.summarise().total_line());
        out.push('\n');
        out
    }

    /// Detailed report returned to the optimiser after a suite run
    pub fn to_formatted_string(&self, iteration: u32) -> String {
        debug!(%iteration, result_count = %self.results.len(), "SuiteResult::to_formatted_string: called");
        let summary = self.summarise();
        let mut lines = vec![
            "# Eval Results".to_string(),
            format!("## Iteration: {}", iteration),
            String::new(),
            "### Summary".to_string(),
            format!("- Total: {}", summary.total()),
            format!(
                "- Correct: {}/{} ({:.2}%)",
                summary.num_correct,
                summary.total(),
                summary.accuracy()
            ),
            String::new(),
            "### Individual Results".to_string(),
        ];

        for (i, result) in self.results.iter().enumerate() {
            let passed = result.attempts.iter().filter(|a| a.is_correct).count();
            lines.push(format!(
                "{}. {} - {} ({}/{} attempts passed)",
                i + 1,
                result.eval_name,
                result.status(),
                passed,
                result.attempts.len()
            ));
            lines.push(format!("   Description: {}", result.eval_desc));

            if !result.attempts.is_empty() {
                lines.push("   Attempts:".to_string());
                for attempt in &result.attempts {
                    lines.push(format!(
                        "   - Attempt {}: {} (Score: {:.1}%)",
                        attempt.attempt_number,
                        if attempt.is_correct { "PASS" } else { "FAIL" },
                        attempt.score * 100.0
                    ));
                    if let Some(details) = payload_details(&attempt.payload) {
                        lines.push(format!("     Details:\n{}", details));
                    }
                }
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

/// Payload rendered as YAML indented under an attempt, `None` when empty
fn payload_details(payload: &Value) -> Option<String> {
    let empty = match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        return None;
    }

    let yaml = serde_yaml::to_string(payload).unwrap_or_else(|_| payload.to_string());
    let indented = yaml
        .trim()
        .lines()
        .map(|line| format!("     {}", line))
        .collect::<Vec<_>>()
        .join("\n");
    Some(indented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attempt(number: u32, score: f64, correct: bool) -> EvalAttempt {
        EvalAttempt {
            attempt_number: number,
            score,
            payload: Value::Null,
            trajectory: vec![],
            hidden_payload: None,
            is_correct: correct,
        }
    }

    fn result(name: &str, attempts: Vec<EvalAttempt>) -> EvalResult {
        EvalResult {
            eval_name: name.to_string(),
            eval_desc: format!("{} description", name),
            attempts,
            threshold: 1.0,
        }
    }

    #[test]
    fn test_eval_passes_if_any_attempt_passes() {
        let r = result("a", vec![attempt(1, 0.0, false), attempt(2, 1.0, true)]);
        assert!(r.is_correct());
        assert!((r.score() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_eval_without_attempts() {
        let r = result("a", vec![]);
        assert!(!r.is_correct());
        assert_eq!(r.score(), 0.0);
    }

    #[test]
    fn test_summary_accuracy() {
        let suite = SuiteResult::new(vec![
            result("a", vec![attempt(1, 1.0, true)]),
            result("b", vec![attempt(1, 0.2, false)]),
            result("c", vec![attempt(1, 0.9, true)]),
            result("d", vec![attempt(1, 0.0, false)]),
        ]);
        let summary = suite.summarise();
        assert_eq!(summary.num_correct, 2);
        assert_eq!(summary.total(), 4);
        assert!((summary.accuracy() - 50.0).abs() < 1e-9);
        assert_eq!(summary.total_line(), "**Total**: 50.0% (2/4 passed)");
    }

    #[test]
    fn test_empty_suite_accuracy_is_zero() {
        assert_eq!(SuiteResult::default().accuracy(), 0.0);
    }

    #[test]
    fn test_score_line() {
        let r = result("parse-dates", vec![attempt(1, 0.875, true)]);
        assert_eq!(r.score_line(), "- parse-dates: PASS (Score: 87.5%)");
    }

    #[test]
    fn test_formatted_string() {
        let mut with_payload = attempt(1, 0.0, false);
        with_payload.payload = json!({"expected": "4", "got": "5"});
        let suite = SuiteResult::new(vec![
            result("math", vec![with_payload, attempt(2, 1.0, true)]),
            result("empty", vec![]),
        ]);

        let text = suite.to_formatted_string(3);
        assert!(text.starts_with("# Eval Results\n## Iteration: 3\n\n### Summary\n- Total: 2\n- Correct: 1/2 (50.00%)"));
        assert!(text.contains("1. math - PASS (1/2 attempts passed)"));
        assert!(text.contains("   Description: math description"));
        assert!(text.contains("   - Attempt 1: FAIL (Score: 0.0%)"));
        assert!(text.contains("     Details:\n     expected: '4'\n     got: '5'"));
        assert!(text.contains("2. empty - FAIL (0/0 attempts passed)"));
        assert!(!text.contains("Details:\n     null"));
    }

    #[test]
    fn test_suite_result_json_defaults() {
        let suite: SuiteResult = serde_json::from_value(json!({
            "results": [{"eval_name": "a", "attempts": [{"attempt_number": 1, "score": 1.0, "is_correct": true}]}]
        }))
        .unwrap();
        assert!(!suite.end_optimisation);
        assert_eq!(suite.results[0].threshold, 1.0);
        assert!(suite.results[0].attempts[0].trajectory.is_empty());
        assert!(suite.find("a").is_some());
        assert!(suite.find("b").is_none());
    }
}
