//! Engine - executes optimiser commands
//!
//! File, shell, eval and subagent commands go through the handler registry.
//! The commands that change optimisation state are executed here, against the
//! shared [`OptimisationState`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::command::{Command, CommandKind, EndIteration, ResetToIteration, UpdateProjectBreakdown};
use crate::dispatch::{ExecutionContext, HandlerRegistry, IterationCompleted};
use crate::eval::EvalRunner;
use crate::monitor::{IterationMetrics, Monitor};
use crate::outcome::Outcome;
use crate::state::{IterationHistoryEntry, OptimisationState};
use crate::subagent::SubagentPool;
use crate::turn::TurnExecutor;
use crate::workspace::FileManager;

pub(crate) struct Engine {
    pub(crate) registry: HandlerRegistry,
    pub(crate) state: Arc<Mutex<OptimisationState>>,
    pub(crate) pool: SubagentPool,
    pub(crate) runner: EvalRunner,
    pub(crate) files: Arc<dyn FileManager>,
    pub(crate) monitor: Arc<dyn Monitor>,
}

impl Engine {
    /// Reject an eval request that shares its response with other commands
    fn reject_companions(kind: CommandKind, output: &str, ctx: &ExecutionContext) -> Option<Outcome> {
        let companions = ctx.batch_companions(kind);
        if companions.is_empty() {
            return None;
        }
        let names: Vec<&str> = companions.iter().map(CommandKind::name).collect();
        info!(%kind, companions = ?names, "Rejecting eval request sent with other actions");
        Some(
            Outcome::error(format!(
                "{} must be the only action in its response apart from debug_log. Also found: {}. It was not run; send it again on its own.",
                kind,
                names.join(", ")
            ))
            .wrapped(output),
        )
    }

    async fn dispose_subagents(&self) -> usize {
        let disposed = self.pool.lock().await.dispose_all();
        if disposed > 0 {
            info!(%disposed, "Disposed active subagents");
        }
        disposed
    }

    async fn run_eval_suite(&self, command: &Command, ctx: &mut ExecutionContext) -> Outcome {
        if let Some(rejected) = Self::reject_companions(CommandKind::RunEvalSuite, "eval", ctx) {
            return rejected;
        }
        self.dispose_subagents().await;
        self.registry.dispatch(command, ctx).await
    }

    async fn end_iteration(&self, request: &EndIteration, ctx: &mut ExecutionContext) -> Outcome {
        debug!(iteration = %ctx.iteration, "Engine::end_iteration: called");
        if let Some(rejected) = Self::reject_companions(CommandKind::EndIteration, "end_iteration", ctx) {
            return rejected;
        }

        let iteration = ctx.iteration;
        let mut state = self.state.lock().await;
        if let Err(e) = state.begin_evaluation() {
            return self.end_iteration_error(&ctx.run_id, iteration, &e.to_string());
        }
        self.dispose_subagents().await;

        let result = match self.runner.run(&ctx.run_id, iteration, &["all".to_string()], 1).await {
            Ok(result) => result,
            Err(e) => {
                if let Err(abort) = state.abort_evaluation() {
                    error!(error = %abort, "Could not leave evaluation phase");
                }
                return self.end_iteration_error(&ctx.run_id, iteration, &format!("{:#}", e));
            }
        };

        state.apply_updates(&request.project_breakdown_updates);
        state.capture_snapshot(iteration + 1, self.files.as_ref()).await;
        self.dispose_subagents().await;

        let pending = state.take_pending_rollback();
        let entry = IterationHistoryEntry::new(iteration, &request.changelog_entry, result.clone(), pending);
        if let Err(e) = state.complete_iteration(entry) {
            return self.end_iteration_error(&ctx.run_id, iteration, &e.to_string());
        }

        ctx.mark_completed(IterationCompleted {
            iteration,
            accuracy: result.accuracy(),
        });
        self.monitor.on_iteration_complete(&IterationMetrics {
            run_id: ctx.run_id.clone(),
            iteration,
            changelog: Some(request.changelog_entry.clone()),
            result: result.clone(),
        });
        if result.end_optimisation {
            info!(%iteration, "Eval suite asked to end optimisation");
            ctx.request_terminate();
        }

        Outcome::success(result.to_formatted_string(iteration)).wrapped("end_iteration")
    }

    fn end_iteration_error(&self, run_id: &str, iteration: u32, message: &str) -> Outcome {
        error!(%iteration, error = %message, "End iteration failed");
        self.monitor.on_error(run_id, iteration, message);
        Outcome::error(format!("Error during end iteration: {}", message)).wrapped("end_iteration")
    }

    async fn update_project_breakdown(&self, request: &UpdateProjectBreakdown) -> Outcome {
        if request.updates.is_empty() {
            return Outcome::error("No updates provided. Include 'files' and/or 'actions' in updates.")
                .wrapped("update_project_breakdown");
        }
        let applied = self.state.lock().await.apply_updates(&request.updates);
        Outcome::success(format!("Project breakdown updated:\n- {}", applied.join("\n- ")))
            .wrapped("update_project_breakdown")
    }

    async fn reset_to_iteration(&self, request: &ResetToIteration) -> Outcome {
        let mut state = self.state.lock().await;
        let outcome = match state
            .rollback(request.iteration_number, &request.reason, self.files.as_ref())
            .await
        {
            Ok(report) => Outcome {
                is_error: report.has_errors(),
                content: report.to_string(),
            },
            Err(e) => {
                info!(target = %request.iteration_number, error = %e, "Rollback rejected");
                Outcome::error(e.to_string())
            }
        };
        outcome.wrapped("reset_to_iteration")
    }
}

#[async_trait]
impl TurnExecutor for Engine {
    /// Every output is wrapped as `<name_output>` except `finish` and
    /// `debug_log`, which print nothing so the turn adds no environment
    /// message for them.
    async fn execute(&mut self, command: Command, ctx: &mut ExecutionContext) -> Outcome {
        let kind = command.kind();
        debug!(%kind, "Engine::execute: called");
        ctx.record(kind);

        match &command {
            Command::Finish(finish) => {
                info!(message = %finish.message, "Optimiser finished");
                ctx.request_terminate();
                Outcome::success("")
            }
            Command::DebugLog(log) => {
                info!("Debug log: {}", log.message);
                Outcome::success("")
            }
            Command::EndIteration(request) => self.end_iteration(request, ctx).await,
            Command::UpdateProjectBreakdown(request) => self.update_project_breakdown(request).await,
            Command::ResetToIteration(request) => self.reset_to_iteration(request).await,
            Command::RunEvalSuite(_) => self.run_eval_suite(&command, ctx).await,
            _ => self.registry.dispatch(&command, ctx).await,
        }
    }
}
