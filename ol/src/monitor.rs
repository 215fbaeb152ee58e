//! Progress monitoring hooks

use std::sync::Mutex;

use tracing::{error, info};

use crate::eval::{SuiteResult, Summary};

/// Results of a completed iteration, or of the initial evaluation
#[derive(Debug, Clone)]
pub struct IterationMetrics {
    pub run_id: String,
    pub iteration: u32,
    /// `None` for the initial evaluation
    pub changelog: Option<String>,
    pub result: SuiteResult,
}

impl IterationMetrics {
    pub fn summary(&self) -> Summary {
        self.result.summarise()
    }

    pub fn accuracy(&self) -> f64 {
        self.summary().accuracy()
    }

    pub fn is_initial(&self) -> bool {
        self.changelog.is_none()
    }
}

/// Observer of an optimisation run
pub trait Monitor: Send + Sync {
    fn on_optimisation_start(&self, run_id: &str);
    fn on_iteration_start(&self, run_id: &str, iteration: u32);
    fn on_iteration_complete(&self, metrics: &IterationMetrics);
    fn on_optimisation_complete(&self, run_id: &str, final_iteration: u32);
    fn on_error(&self, run_id: &str, iteration: u32, error: &str);
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Best {
    accuracy: f64,
    iteration: u32,
}

/// Writes milestones to the log and tracks the best pass-rate
#[derive(Debug, Default)]
pub struct LoggingMonitor {
    best: Mutex<Best>,
}

impl LoggingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best pass-rate seen so far and its iteration
    pub fn best(&self) -> (f64, u32) {
        let best = self.best.lock().map(|b| *b).unwrap_or_default();
        (best.accuracy, best.iteration)
    }
}

impl Monitor for LoggingMonitor {
    fn on_optimisation_start(&self, run_id: &str) {
        info!(%run_id, "Starting optimisation run");
    }

    fn on_iteration_start(&self, run_id: &str, iteration: u32) {
        info!(%run_id, %iteration, "Starting iteration");
    }

    fn on_iteration_complete(&self, metrics: &IterationMetrics) {
        let summary = metrics.summary();
        let accuracy = summary.accuracy();

        let (best, improved) = match self.best.lock() {
            Ok(mut best) => {
                let improved = accuracy > best.accuracy;
                if improved {
                    *best = Best {
                        accuracy,
                        iteration: metrics.iteration,
                    };
                }
                (*best, improved)
            }
            Err(_) => (Best::default(), false),
        };

        if metrics.is_initial() {
            info!(
                "Initial evaluation complete - Accuracy: {:.1}% ({}/{} passed)",
                accuracy,
                summary.num_correct,
                summary.total()
            );
            return;
        }

        info!(
            "Iteration {} complete - Accuracy: {:.1}% ({}/{} passed) | Best: {:.1}% (iter {}){}",
            metrics.iteration,
            accuracy,
            summary.num_correct,
            summary.total(),
            best.accuracy,
            best.iteration,
            if improved { " NEW BEST" } else { "" }
        );
        if let Some(changelog) = metrics.changelog.as_deref().filter(|c| !c.is_empty()) {
            info!("Changes: {}", changelog);
        }
    }

    fn on_optimisation_complete(&self, run_id: &str, final_iteration: u32) {
        let (accuracy, iteration) = self.best();
        info!(
            %run_id,
            "Optimisation complete. Final iteration: {} | Best accuracy: {:.1}% (iteration {})",
            final_iteration,
            accuracy,
            iteration
        );
    }

    fn on_error(&self, run_id: &str, iteration: u32, error: &str) {
        error!(%run_id, %iteration, "Error in iteration {}: {}", iteration, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalAttempt, EvalResult};
    use serde_json::Value;

    fn metrics(iteration: u32, passed: usize, total: usize, changelog: Option<&str>) -> IterationMetrics {
        IterationMetrics {
            run_id: "run".to_string(),
            iteration,
            changelog: changelog.map(str::to_string),
            result: SuiteResult::new(
                (0..total)
                    .map(|i| EvalResult {
                        eval_name: format!("e{}", i),
                        eval_desc: String::new(),
                        attempts: vec![EvalAttempt {
                            attempt_number: 1,
                            score: 0.0,
                            payload: Value::Null,
                            trajectory: vec![],
                            hidden_payload: None,
                            is_correct: i < passed,
                        }],
                        threshold: 1.0,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_tracks_best_iteration() {
        let monitor = LoggingMonitor::new();
        monitor.on_iteration_complete(&metrics(0, 5, 10, None));
        assert_eq!(monitor.best(), (50.0, 0));

        monitor.on_iteration_complete(&metrics(0, 8, 10, Some("better prompt")));
        monitor.on_iteration_complete(&metrics(1, 6, 10, Some("worse")));
        assert_eq!(monitor.best(), (80.0, 0));

        monitor.on_iteration_complete(&metrics(2, 9, 10, Some("fixed tool")));
        assert_eq!(monitor.best(), (90.0, 2));
    }

    #[test]
    fn test_initial_metrics() {
        let initial = metrics(0, 1, 4, None);
        assert!(initial.is_initial());
        assert!((initial.accuracy() - 25.0).abs() < 1e-9);
        assert!(!metrics(0, 1, 4, Some("x")).is_initial());
    }
}
