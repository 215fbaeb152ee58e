//! Trajectory analysis subagents: dispatch and follow-up messages

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::unsupported;
use crate::command::{Command, DispatchTrajAnalysis, SendSubagentMessage};
use crate::dispatch::{ExecutionContext, Handler};
use crate::llm::LlmClient;
use crate::outcome::Outcome;
use crate::prompts::Prompts;
use crate::state::OptimisationState;
use crate::storage::EvalStore;
use crate::subagent::{Subagent, SubagentPool, SubagentSettings};
use crate::workspace::FileManager;

const DISPATCH_OUTPUT: &str = "dispatch_traj_analysis_agent";
const MESSAGE_OUTPUT: &str = "send_subagent_message";

/// Starts a trajectory analysis agent for one eval attempt
pub struct DispatchAnalysisHandler {
    store: Arc<dyn EvalStore>,
    llm: Arc<dyn LlmClient>,
    files: Arc<dyn FileManager>,
    state: Arc<Mutex<OptimisationState>>,
    pool: SubagentPool,
    prompts: Arc<Prompts>,
    settings: SubagentSettings,
}

impl DispatchAnalysisHandler {
    pub fn new(
        store: Arc<dyn EvalStore>,
        llm: Arc<dyn LlmClient>,
        files: Arc<dyn FileManager>,
        state: Arc<Mutex<OptimisationState>>,
        pool: SubagentPool,
        prompts: Arc<Prompts>,
        settings: SubagentSettings,
    ) -> Self {
        Self {
            store,
            llm,
            files,
            state,
            pool,
            prompts,
            settings,
        }
    }

    async fn dispatch(&self, request: &DispatchTrajAnalysis, ctx: &ExecutionContext) -> Result<Outcome> {
        let iteration = request.iteration_number;
        let Some(results) = self.store.get_eval_results(&ctx.run_id, iteration).await? else {
            return Ok(Outcome::error(format!(
                "No evaluation results found for iteration {}",
                iteration
            )));
        };

        let Some(eval) = results.find(&request.eval_name) else {
            return Ok(Outcome::error(format!(
                "No evaluation found with name '{}' in iteration {}",
                request.eval_name, iteration
            )));
        };

        let Some(attempt) = eval.attempt(request.attempt_number) else {
            let available: Vec<u32> = eval.attempts.iter().map(|a| a.attempt_number).collect();
            return Ok(Outcome::error(format!(
                "No attempt found with number {} for eval '{}' in iteration {}. Available attempts: {:?}",
                request.attempt_number, request.eval_name, iteration, available
            )));
        };

        let trajectory = strip_system_entry(&attempt.trajectory);
        let actions = self.state.lock().await.breakdown().actions_to_str();
        let initial_message =
            self.prompts
                .dispatch_message(&request.initial_message, &actions, request.attempt_number, trajectory)?;

        let mut subagent = Subagent::new(
            self.llm.clone(),
            self.files.clone(),
            self.prompts.trajectory_analysis_system()?,
            initial_message,
            self.settings.clone(),
        );

        let mut report = subagent.run().await?.and_then(|reply| reply.report());
        if report.is_none() {
            info!(eval = %request.eval_name, "Subagent finished without a report, asking again");
            let follow_up = self.prompts.report_required()?;
            report = subagent
                .continue_with_message(&follow_up)
                .await?
                .and_then(|reply| reply.report());
        }

        let Some(report) = report else {
            return Ok(Outcome::error(
                "Trajectory analysis agent completed but did not provide a report after retry",
            ));
        };

        let id = self.pool.lock().await.register(subagent);
        Ok(Outcome::success(format!(
            "Subagent ID: {}\n\nTrajectory analysis agent report:\n\n{}",
            id, report
        )))
    }
}

/// Drop a leading entry produced by the system prompt of the evaluated agent
fn strip_system_entry(trajectory: &[Value]) -> &[Value] {
    match trajectory.first() {
        Some(first) if first.get("source").and_then(Value::as_str) == Some("system") => &trajectory[1..],
        _ => trajectory,
    }
}

#[async_trait]
impl Handler for DispatchAnalysisHandler {
    fn name(&self) -> &'static str {
        "dispatch_analysis"
    }

    async fn handle(&self, command: &Command, ctx: &mut ExecutionContext) -> Outcome {
        let Command::DispatchTrajAnalysis(request) = command else {
            return unsupported(self.name(), command);
        };
        debug!(
            eval = %request.eval_name,
            iteration = %request.iteration_number,
            attempt = %request.attempt_number,
            "DispatchAnalysisHandler::handle: called"
        );

        match self.dispatch(request, ctx).await {
            Ok(outcome) => outcome.wrapped(DISPATCH_OUTPUT),
            Err(e) => {
                error!(error = %e, "Trajectory analysis dispatch failed");
                Outcome::error(format!("Error dispatching trajectory analysis agent: {}", e)).wrapped(DISPATCH_OUTPUT)
            }
        }
    }
}

/// Sends a follow-up question to an active subagent
pub struct SendMessageHandler {
    pool: SubagentPool,
}

impl SendMessageHandler {
    pub fn new(pool: SubagentPool) -> Self {
        Self { pool }
    }

    async fn send(&self, request: &SendSubagentMessage) -> Result<Outcome> {
        let mut pool = self.pool.lock().await;
        let active = pool.list_active_ids();
        let Some(subagent) = pool.get_mut(&request.subagent_id) else {
            let active = if active.is_empty() {
                "none".to_string()
            } else {
                format!("{:?}", active)
            };
            return Ok(Outcome::error(format!(
                "No active subagent found with ID '{}'. Active subagent IDs: {}",
                request.subagent_id, active
            )));
        };

        match subagent.continue_with_message(&request.message).await? {
            Some(reply) => Ok(Outcome::success(format!(
                "Subagent ({}) response:\n\n{}",
                request.subagent_id, reply.message
            ))),
            None => Ok(Outcome::error(
                "Subagent did not provide a valid response. The subagent should use the 'respond' or 'report' action.",
            )),
        }
    }
}

#[async_trait]
impl Handler for SendMessageHandler {
    fn name(&self) -> &'static str {
        "send_subagent_message"
    }

    async fn handle(&self, command: &Command, _ctx: &mut ExecutionContext) -> Outcome {
        let Command::SendSubagentMessage(request) = command else {
            return unsupported(self.name(), command);
        };
        debug!(subagent_id = %request.subagent_id, "SendMessageHandler::handle: called");

        match self.send(request).await {
            Ok(outcome) => outcome.wrapped(MESSAGE_OUTPUT),
            Err(e) => {
                error!(error = %e, "Subagent message failed");
                Outcome::error(format!("Error sending message to subagent: {}", e)).wrapped(MESSAGE_OUTPUT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{EvalAttempt, EvalResult, SuiteResult};
    use crate::llm::client::mock::MockLlmClient;
    use crate::state::ProjectBreakdown;
    use crate::state::breakdown::SAMPLE;
    use crate::storage::MemoryStore;
    use crate::subagent::new_pool;
    use crate::workspace::InMemoryFileManager;
    use serde_json::json;

    fn settings() -> SubagentSettings {
        SubagentSettings {
            max_turns: 3,
            max_tokens: 1000,
            temperature: None,
            kind_field: "action_type".to_string(),
        }
    }

    fn results() -> SuiteResult {
        SuiteResult::new(vec![EvalResult {
            eval_name: "dates".to_string(),
            eval_desc: String::new(),
            attempts: vec![EvalAttempt {
                attempt_number: 1,
                score: 0.0,
                payload: Value::Null,
                trajectory: vec![
                    json!({"source": "system", "content": "SECRET SYSTEM PROMPT"}),
                    json!({"source": "user", "content": "What day is it?"}),
                ],
                hidden_payload: None,
                is_correct: false,
            }],
            threshold: 1.0,
        }])
    }

    async fn handler(llm: Arc<MockLlmClient>, pool: SubagentPool) -> DispatchAnalysisHandler {
        let store = Arc::new(MemoryStore::new());
        store.put_eval_results("run", 0, &results()).await.unwrap();
        let state = OptimisationState::new(ProjectBreakdown::parse(SAMPLE).unwrap());
        DispatchAnalysisHandler::new(
            store,
            llm,
            Arc::new(InMemoryFileManager::new()),
            Arc::new(Mutex::new(state)),
            pool,
            Arc::new(Prompts::new("action_type")),
            settings(),
        )
    }

    fn dispatch(eval_name: &str, iteration: u32, attempt: u32) -> Command {
        Command::DispatchTrajAnalysis(DispatchTrajAnalysis {
            initial_message: "Why did it fail?".to_string(),
            iteration_number: iteration,
            eval_name: eval_name.to_string(),
            attempt_number: attempt,
        })
    }

    fn message(id: &str, text: &str) -> Command {
        Command::SendSubagentMessage(SendSubagentMessage {
            subagent_id: id.to_string(),
            message: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_dispatch_registers_and_reports() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "report", "message": "The agent guessed the date."}"#,
        ]));
        let pool = new_pool();
        let handler = handler(llm.clone(), pool.clone()).await;
        let mut ctx = ExecutionContext::new("run", 1);

        let outcome = handler.handle(&dispatch("dates", 0, 1), &mut ctx).await;
        assert!(!outcome.is_error, "{}", outcome.content);
        assert!(outcome.content.starts_with("<dispatch_traj_analysis_agent_output>\nSubagent ID: "));
        assert!(outcome.content.contains("Trajectory analysis agent report:\n\nThe agent guessed the date."));
        assert_eq!(pool.lock().await.active_count(), 1);

        let first = &llm.requests()[0].messages[0].content;
        assert!(first.starts_with("# Initial message\nWhy did it fail?"));
        assert!(first.contains("- search: Search the index"));
        assert!(first.contains("What day is it?"));
        assert!(!first.contains("SECRET SYSTEM PROMPT"));
    }

    #[tokio::test]
    async fn test_dispatch_retries_for_report_once() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "respond", "message": "hmm"}"#,
            r#"{"action_type": "respond", "message": "still no report"}"#,
        ]));
        let pool = new_pool();
        let handler = handler(llm.clone(), pool.clone()).await;
        let mut ctx = ExecutionContext::new("run", 1);

        let outcome = handler.handle(&dispatch("dates", 0, 1), &mut ctx).await;
        assert!(outcome.is_error);
        assert!(
            outcome
                .content
                .contains("Trajectory analysis agent completed but did not provide a report after retry")
        );
        assert_eq!(llm.call_count(), 2);
        assert!(llm.requests()[1].messages[2].content.contains("did not include a valid report"));
        assert_eq!(pool.lock().await.active_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_lookup_errors() {
        let llm = Arc::new(MockLlmClient::texts(&[]));
        let handler = handler(llm.clone(), new_pool()).await;
        let mut ctx = ExecutionContext::new("run", 1);

        let outcome = handler.handle(&dispatch("dates", 5, 1), &mut ctx).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("No evaluation results found for iteration 5"));

        let outcome = handler.handle(&dispatch("maths", 0, 1), &mut ctx).await;
        assert!(outcome.content.contains("No evaluation found with name 'maths' in iteration 0"));

        let outcome = handler.handle(&dispatch("dates", 0, 3), &mut ctx).await;
        assert!(
            outcome
                .content
                .contains("No attempt found with number 3 for eval 'dates' in iteration 0. Available attempts: [1]")
        );
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_llm_failure_is_caught() {
        let llm = Arc::new(MockLlmClient::texts(&[]));
        let handler = handler(llm, new_pool()).await;
        let mut ctx = ExecutionContext::new("run", 1);

        let outcome = handler.handle(&dispatch("dates", 0, 1), &mut ctx).await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("Error dispatching trajectory analysis agent: "));
    }

    #[tokio::test]
    async fn test_message_unknown_subagent() {
        let handler = SendMessageHandler::new(new_pool());
        let mut ctx = ExecutionContext::new("run", 0);

        let outcome = handler.handle(&message("calm-owl", "hi"), &mut ctx).await;
        assert!(outcome.is_error);
        assert_eq!(
            outcome.content,
            "<send_subagent_message_output>\nNo active subagent found with ID 'calm-owl'. Active subagent IDs: none\n</send_subagent_message_output>"
        );
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "report", "message": "initial"}"#,
            r#"{"action_type": "respond", "message": "Step 3 used the wrong tool."}"#,
        ]));
        let pool = new_pool();
        let dispatcher = handler(llm, pool.clone()).await;
        let mut ctx = ExecutionContext::new("run", 1);
        dispatcher.handle(&dispatch("dates", 0, 1), &mut ctx).await;
        let id = pool.lock().await.list_active_ids()[0].clone();

        let handler = SendMessageHandler::new(pool.clone());
        let outcome = handler.handle(&message("nope", "hi"), &mut ctx).await;
        assert!(outcome.content.contains(&format!("Active subagent IDs: [\"{}\"]", id)));

        let outcome = handler.handle(&message(&id, "Which step?"), &mut ctx).await;
        assert!(!outcome.is_error);
        assert!(
            outcome
                .content
                .contains(&format!("Subagent ({}) response:\n\nStep 3 used the wrong tool.", id))
        );
    }

    #[tokio::test]
    async fn test_message_without_reply() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "report", "message": "initial"}"#,
            "no actions",
            "still none",
            "nothing",
        ]));
        let pool = new_pool();
        let dispatcher = handler(llm, pool.clone()).await;
        let mut ctx = ExecutionContext::new("run", 1);
        dispatcher.handle(&dispatch("dates", 0, 1), &mut ctx).await;
        let id = pool.lock().await.list_active_ids()[0].clone();

        let outcome = SendMessageHandler::new(pool)
            .handle(&message(&id, "more?"), &mut ctx)
            .await;
        assert!(outcome.is_error);
        assert!(outcome.content.contains("Subagent did not provide a valid response."));
    }

    #[test]
    fn test_strip_system_entry() {
        let trajectory = vec![json!({"source": "agent"}), json!({"source": "system"})];
        assert_eq!(strip_system_entry(&trajectory).len(), 2);
        assert!(strip_system_entry(&[]).is_empty());
    }
}
