//! Evaluation suite boundary
//!
//! The optimiser never evaluates anything itself. It asks an [`EvalSuite`]
//! for results and the [`EvalRunner`] persists every result it gets back,
//! keyed by run and iteration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use tokio::process::Command;
use tracing::{debug, info};

use super::SuiteResult;
use crate::storage::EvalStore;

/// Arguments handed to the evaluation suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalRequest {
    pub iteration: u32,
    /// Eval names, or `["all"]`
    pub evals: Vec<String>,
    pub attempts: u32,
}

/// External evaluation callback
#[async_trait]
pub trait EvalSuite: Send + Sync {
    async fn run(&self, request: &EvalRequest) -> Result<SuiteResult>;
}

/// Runs an external command and reads a [`SuiteResult`] as JSON from its stdout
///
/// The request is passed through the environment as `OPTLOOP_ITERATION`,
/// `OPTLOOP_EVALS` (comma separated) and `OPTLOOP_ATTEMPTS`.
pub struct CommandEvalSuite {
    command: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CommandEvalSuite {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let command = command.into();
        debug!(%command, "CommandEvalSuite::new: called");
        Self {
            command,
            working_dir: working_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl EvalSuite for CommandEvalSuite {
    async fn run(&self, request: &EvalRequest) -> Result<SuiteResult> {
        debug!(iteration = %request.iteration, evals = ?request.evals, attempts = %request.attempts, "CommandEvalSuite::run: called");
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.working_dir)
            .env("OPTLOOP_ITERATION", request.iteration.to_string())
            .env("OPTLOOP_EVALS", request.evals.join(","))
            .env("OPTLOOP_ATTEMPTS", request.attempts.to_string())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| eyre!("Eval command timed out after {:?}: {}", self.timeout, self.command))?
            .context(format!("Failed to start eval command: {}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "Eval command failed with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let result: SuiteResult =
            serde_json::from_slice(&output.stdout).context("Failed to parse eval command output as a suite result")?;
        debug!(result_count = %result.results.len(), "CommandEvalSuite::run: parsed results");
        Ok(result)
    }
}

/// Runs the suite and stores what it returns
#[derive(Clone)]
pub struct EvalRunner {
    suite: Arc<dyn EvalSuite>,
    store: Arc<dyn EvalStore>,
}

impl EvalRunner {
    pub fn new(suite: Arc<dyn EvalSuite>, store: Arc<dyn EvalStore>) -> Self {
        Self { suite, store }
    }

    pub async fn run(&self, run_id: &str, iteration: u32, evals: &[String], attempts: u32) -> Result<SuiteResult> {
        debug!(%run_id, %iteration, ?evals, %attempts, "EvalRunner::run: called");
        let request = EvalRequest {
            iteration,
            evals: evals.to_vec(),
            attempts,
        };
        let result = self.suite.run(&request).await?;
        info!(
            %run_id,
            %iteration,
            accuracy = %format!("{:.1}", result.accuracy()),
            "Eval suite completed"
        );
        self.store
            .put_eval_results(run_id, iteration, &result)
            .await
            .context("Failed to store eval results")?;
        Ok(result)
    }

    pub fn store(&self) -> &Arc<dyn EvalStore> {
        &self.store
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalAttempt, EvalResult};
    use crate::storage::MemoryStore;
    use mock::ScriptedEvalSuite;
    use serde_json::Value;

    fn request() -> EvalRequest {
        EvalRequest {
            iteration: 2,
            evals: vec!["a".to_string(), "b".to_string()],
            attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_command_suite_parses_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let suite = CommandEvalSuite::new(
            r#"echo '{"results": [{"eval_name": "'"$OPTLOOP_EVALS"'", "attempts": []}]}'"#,
            dir.path(),
            Duration::from_secs(10),
        );
        let result = suite.run(&request()).await.unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].eval_name, "a,b");
    }

    #[tokio::test]
    async fn test_command_suite_passes_iteration_and_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let suite = CommandEvalSuite::new(
            r#"echo "{\"results\": [{\"eval_name\": \"i$OPTLOOP_ITERATION-n$OPTLOOP_ATTEMPTS\"}]}""#,
            dir.path(),
            Duration::from_secs(10),
        );
        let result = suite.run(&request()).await.unwrap();
        assert_eq!(result.results[0].eval_name, "i2-n3");
    }

    #[tokio::test]
    async fn test_command_suite_failure() {
        let dir = tempfile::tempdir().unwrap();
        let suite = CommandEvalSuite::new("echo broken >&2; exit 3", dir.path(), Duration::from_secs(10));
        let err = suite.run(&request()).await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_command_suite_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let suite = CommandEvalSuite::new("echo not json", dir.path(), Duration::from_secs(10));
        assert!(suite.run(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_command_suite_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let suite = CommandEvalSuite::new("sleep 5", dir.path(), Duration::from_millis(100));
        let err = suite.run(&request()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_runner_stores_results() {
        let result = SuiteResult::new(vec![EvalResult {
            eval_name: "a".to_string(),
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
        }]);
        let suite = Arc::new(ScriptedEvalSuite::new(vec![result.clone()]));
        let store = Arc::new(MemoryStore::new());
        let runner = EvalRunner::new(suite.clone(), store.clone());

        let got = runner.run("run-1", 4, &["all".to_string()], 1).await.unwrap();
        assert_eq!(got, result);
        assert_eq!(store.get_eval_results("run-1", 4).await.unwrap(), Some(result));
        assert_eq!(suite.requests()[0].iteration, 4);
    }

    #[tokio::test]
    async fn test_runner_propagates_suite_error() {
        let suite = Arc::new(ScriptedEvalSuite::with_outcomes(vec![Err("suite crashed".to_string())]));
        let store = Arc::new(MemoryStore::new());
        let runner = EvalRunner::new(suite, store.clone());

        let err = runner.run("run-1", 1, &["all".to_string()], 1).await.unwrap_err();
        assert!(err.to_string().contains("suite crashed"));
        assert_eq!(store.get_eval_results("run-1", 1).await.unwrap(), None);
    }
}
