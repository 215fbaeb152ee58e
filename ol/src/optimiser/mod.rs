//! Optimiser - the driving loop
//!
//! Runs the baseline evaluation, then alternates model turns and command
//! execution until the model finishes, the suite asks to stop, or the
//! iteration cap is reached. Every completed iteration collapses the
//! conversation to a fresh state summary.

mod engine;

use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::command::CommandKind;
use crate::config::Config;
use crate::dispatch::handlers::{DispatchAnalysisHandler, EvalHandler, FileHandler, SendMessageHandler, ShellHandler};
use crate::dispatch::{ExecutionContext, HandlerRegistry};
use crate::eval::{EvalRunner, EvalSuite};
use crate::extract::{CommandCatalog, Extractor, ExtractionStrategy};
use crate::llm::{LlmClient, Message};
use crate::monitor::{IterationMetrics, Monitor};
use crate::prompts::Prompts;
use crate::state::{OptimisationState, ProjectBreakdown};
use crate::storage::{EvalStore, MessageStore};
use crate::subagent::{SubagentPool, SubagentSettings, new_pool};
use crate::turn::{Conversation, process_turn};
use crate::workspace::{FileManager, ShellExecutor};

use engine::Engine;

/// Collaborators the optimiser talks to
#[derive(Clone)]
pub struct OptimiserDeps {
    pub llm: Arc<dyn LlmClient>,
    pub files: Arc<dyn FileManager>,
    pub shell: Arc<dyn ShellExecutor>,
    pub suite: Arc<dyn EvalSuite>,
    pub eval_store: Arc<dyn EvalStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub monitor: Arc<dyn Monitor>,
}

/// Loop limits and sampling parameters
#[derive(Debug, Clone)]
pub struct OptimiserSettings {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Attempts per eval for the baseline run
    pub initial_attempts: u32,
    /// Stop once this many iterations completed
    pub max_iterations: Option<u32>,
    pub subagent_max_turns: u32,
    pub kind_field: String,
    pub extraction: ExtractionStrategy,
}

impl OptimiserSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            initial_attempts: config.optimiser.initial_attempts,
            max_iterations: config.optimiser.max_iterations,
            subagent_max_turns: config.optimiser.subagent_max_turns,
            kind_field: config.optimiser.action_field.clone(),
            extraction: config.optimiser.extraction,
        }
    }
}

impl Default for OptimiserSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One optimisation run
pub struct Optimiser {
    run_id: String,
    settings: OptimiserSettings,
    llm: Arc<dyn LlmClient>,
    message_store: Arc<dyn MessageStore>,
    monitor: Arc<dyn Monitor>,
    files: Arc<dyn FileManager>,
    runner: EvalRunner,
    state: Arc<Mutex<OptimisationState>>,
    extractor: Box<dyn Extractor>,
    conversation: Conversation,
    /// Turns dropped by earlier collapses
    archived: Vec<Message>,
    engine: Engine,
}

impl Optimiser {
    pub fn new(deps: OptimiserDeps, breakdown: ProjectBreakdown, settings: OptimiserSettings) -> Result<Self> {
        debug!(kind_field = %settings.kind_field, extraction = ?settings.extraction, "Optimiser::new: called");
        let prompts = Arc::new(Prompts::new(&settings.kind_field));
        let system_prompt = prompts
            .optimiser_system(settings.extraction)
            .context("Failed to render optimiser system prompt")?;
        let extractor = settings
            .extraction
            .build(CommandCatalog::optimiser(), &settings.kind_field);

        let state = Arc::new(Mutex::new(OptimisationState::new(breakdown)));
        let pool = new_pool();
        let runner = EvalRunner::new(deps.suite.clone(), deps.eval_store.clone());
        let registry = Self::build_registry(&deps, &settings, &state, &pool, &runner, prompts);

        let engine = Engine {
            registry,
            state: state.clone(),
            pool,
            runner: runner.clone(),
            files: deps.files.clone(),
            monitor: deps.monitor.clone(),
        };

        Ok(Self {
            run_id: runstore::RunStore::new_run_id(),
            settings,
            llm: deps.llm,
            message_store: deps.message_store,
            monitor: deps.monitor,
            files: deps.files,
            runner,
            state,
            extractor,
            conversation: Conversation::new(system_prompt),
            archived: Vec::new(),
            engine,
        })
    }

    fn build_registry(
        deps: &OptimiserDeps,
        settings: &OptimiserSettings,
        state: &Arc<Mutex<OptimisationState>>,
        pool: &SubagentPool,
        runner: &EvalRunner,
        prompts: Arc<Prompts>,
    ) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register_all(
            &[
                CommandKind::Read,
                CommandKind::Write,
                CommandKind::Edit,
                CommandKind::MultiEdit,
            ],
            Arc::new(FileHandler::new(deps.files.clone())),
        );
        registry.register(CommandKind::Bash, Arc::new(ShellHandler::new(deps.shell.clone())));
        registry.register(CommandKind::RunEvalSuite, Arc::new(EvalHandler::new(runner.clone())));
        registry.register(
            CommandKind::DispatchTrajAnalysisAgent,
            Arc::new(DispatchAnalysisHandler::new(
                deps.eval_store.clone(),
                deps.llm.clone(),
                deps.files.clone(),
                state.clone(),
                pool.clone(),
                prompts,
                SubagentSettings {
                    max_turns: settings.subagent_max_turns,
                    max_tokens: settings.max_tokens,
                    temperature: settings.temperature,
                    kind_field: settings.kind_field.clone(),
                },
            )),
        );
        registry.register(
            CommandKind::SendSubagentMessage,
            Arc::new(SendMessageHandler::new(pool.clone())),
        );
        registry
    }

    /// Use a caller-chosen run id instead of a generated one
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Shared handle on the optimisation state
    pub fn state(&self) -> Arc<Mutex<OptimisationState>> {
        self.state.clone()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Every message of the run so far, system prompt first
    pub fn transcript(&self) -> Vec<Message> {
        let mut messages = vec![Message::system(self.conversation.system_prompt())];
        messages.extend(self.archived.iter().cloned());
        messages.extend(self.conversation.messages().iter().cloned());
        messages
    }

    /// Run until the model finishes; returns the run id
    pub async fn optimise(&mut self) -> Result<String> {
        info!(run_id = %self.run_id, "Optimiser::optimise: starting");
        self.monitor.on_optimisation_start(&self.run_id);

        let stop = self.initial_evaluation().await?;
        if !stop {
            if let Err(e) = self.drive().await {
                self.persist().await;
                return Err(e);
            }
        }

        let final_iteration = {
            let mut state = self.state.lock().await;
            state.finish();
            state.iteration()
        };
        self.monitor.on_optimisation_complete(&self.run_id, final_iteration);
        self.persist().await;
        info!(run_id = %self.run_id, %final_iteration, "Optimisation finished");
        Ok(self.run_id.clone())
    }

    /// Snapshot the baseline and evaluate it; returns true when the suite asked to stop
    async fn initial_evaluation(&mut self) -> Result<bool> {
        debug!(attempts = %self.settings.initial_attempts, "Optimiser::initial_evaluation: called");
        let mut state = self.state.lock().await;
        state.capture_snapshot(0, self.files.as_ref()).await;

        let result = match self
            .runner
            .run(&self.run_id, 0, &["all".to_string()], self.settings.initial_attempts)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                self.monitor.on_error(&self.run_id, 0, &format!("{:#}", e));
                return Err(e.wrap_err("Initial evaluation failed"));
            }
        };
        let stop = result.end_optimisation;
        state.set_initial_result(result.clone())?;

        self.monitor.on_iteration_complete(&IterationMetrics {
            run_id: self.run_id.clone(),
            iteration: 0,
            changelog: None,
            result,
        });
        self.conversation.push_user(state.to_context());
        if stop {
            info!("Eval suite asked to end optimisation after the initial run");
        }
        Ok(stop)
    }

    async fn drive(&mut self) -> Result<()> {
        let mut iteration = self.state.lock().await.iteration();
        self.monitor.on_iteration_start(&self.run_id, iteration);

        loop {
            let request = self
                .conversation
                .request(self.settings.max_tokens, self.settings.temperature);
            let response = match self.llm.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(%iteration, error = %e, "Model request failed");
                    self.monitor.on_error(&self.run_id, iteration, &e.to_string());
                    return Err(eyre::Report::new(e).wrap_err(format!("Model request failed in iteration {}", iteration)));
                }
            };

            let mut ctx = ExecutionContext::new(self.run_id.clone(), iteration);
            let done = process_turn(
                &mut self.engine,
                self.extractor.as_ref(),
                &mut self.conversation,
                &response.content,
                &mut ctx,
            )
            .await;
            if done {
                debug!(%iteration, "Optimiser::drive: terminate requested");
                return Ok(());
            }

            let Some(completed) = ctx.completed() else {
                continue;
            };
            info!(
                iteration = %completed.iteration,
                accuracy = %format!("{:.1}", completed.accuracy),
                "Iteration complete, collapsing context"
            );

            let context = {
                let mut state = self.state.lock().await;
                let context = state.to_context();
                iteration = state.resume()?;
                context
            };
            self.archived.extend(self.conversation.messages().iter().cloned());
            self.conversation.collapse(context);

            if let Some(max) = self.settings.max_iterations
                && iteration >= max
            {
                info!(%max, "Iteration limit reached");
                return Ok(());
            }
            self.monitor.on_iteration_start(&self.run_id, iteration);
        }
    }

    async fn persist(&self) {
        let messages = self.transcript();
        if let Err(e) = self.message_store.put_messages(&self.run_id, &messages).await {
            warn!(run_id = %self.run_id, error = %e, "Failed to store message history");
        }
    }
}
