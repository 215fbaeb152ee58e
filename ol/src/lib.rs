//! Optloop - autonomous iterative optimisation loop
//!
//! A model is handed a system to improve, a project breakdown describing its
//! key files, and the results of an evaluation suite. It answers with text in
//! which commands are embedded; the commands are extracted, dispatched and
//! their outputs fed back. Each `end_iteration` evaluates the changes,
//! records them and restarts the conversation from a state summary.
//!
//! # Modules
//!
//! - [`command`] - Typed commands and their validation
//! - [`extract`] - Pulling commands out of generated text
//! - [`dispatch`] - Handler registry and per-turn execution context
//! - [`state`] - Snapshots, history, rollback and the resume context
//! - [`subagent`] - Trajectory analysis helper conversations
//! - [`optimiser`] - The driving loop
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod eval;
pub mod extract;
pub mod llm;
pub mod monitor;
pub mod optimiser;
pub mod outcome;
pub mod prompts;
pub mod state;
pub mod storage;
pub mod subagent;
pub mod turn;
pub mod workspace;

// Re-export commonly used types
pub use command::{Command, CommandKind, ValidationError};
pub use config::{Config, LlmConfig};
pub use dispatch::{ExecutionContext, Handler, HandlerRegistry};
pub use eval::{CommandEvalSuite, EvalRunner, EvalSuite, SuiteResult};
pub use extract::{CommandCatalog, Extraction, ExtractionStrategy, Extractor};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use monitor::{LoggingMonitor, Monitor};
pub use optimiser::{Optimiser, OptimiserDeps, OptimiserSettings};
pub use outcome::Outcome;
pub use state::{OptimisationState, ProjectBreakdown};
pub use storage::{EvalStore, FileStore, MemoryStore, MessageStore};
pub use workspace::{FileManager, InMemoryFileManager, LocalFileManager, LocalShell, ShellExecutor};
