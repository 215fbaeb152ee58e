//! Built-in handlers

mod eval;
mod file;
mod shell;
mod subagent;

pub use eval::EvalHandler;
pub use file::FileHandler;
pub use shell::ShellHandler;
pub use subagent::{DispatchAnalysisHandler, SendMessageHandler};

use tracing::warn;

use crate::command::Command;
use crate::outcome::Outcome;

/// Outcome for a command routed to a handler that does not know its kind
fn unsupported(handler: &str, command: &Command) -> Outcome {
    let kind = command.kind();
    warn!(%handler, %kind, "Command routed to the wrong handler");
    Outcome::error(format!("[ERROR] Unknown command kind: {}", kind)).wrapped("unknown")
}
