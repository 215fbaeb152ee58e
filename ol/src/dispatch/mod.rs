//! Handler dispatch
//!
//! The registry maps a [`CommandKind`] to the [`Handler`] that executes it.
//! Handlers own their collaborators; the registry only looks them up. Every
//! handler wraps its text in the `<name_output>` block itself, the registry
//! does the same for kinds nobody registered.

mod context;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::command::{Command, CommandKind};

pub use crate::outcome::{Outcome, format_output};
pub use context::{ExecutionContext, IterationCompleted};

/// Executes one or more command kinds
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Execute `command`; failures are reported as an error outcome, never panics
    async fn handle(&self, command: &Command, ctx: &mut ExecutionContext) -> Outcome;
}

/// Kind -> handler lookup
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandKind, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `kind` to `handler`, replacing any earlier binding
    pub fn register(&mut self, kind: CommandKind, handler: Arc<dyn Handler>) {
        debug!(%kind, handler = %handler.name(), "HandlerRegistry::register: called");
        self.handlers.insert(kind, handler);
    }

    /// Bind every kind in `kinds` to the same handler
    pub fn register_all(&mut self, kinds: &[CommandKind], handler: Arc<dyn Handler>) {
        for kind in kinds {
            self.register(*kind, handler.clone());
        }
    }

    pub fn is_registered(&self, kind: CommandKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds in catalogue order
    pub fn kinds(&self) -> Vec<CommandKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Run the handler bound to the command's kind
    pub async fn dispatch(&self, command: &Command, ctx: &mut ExecutionContext) -> Outcome {
        let kind = command.kind();
        debug!(%kind, "HandlerRegistry::dispatch: called");
        match self.handlers.get(&kind) {
            Some(handler) => handler.handle(command, ctx).await,
            None => {
                warn!(%kind, "No handler registered");
                Outcome::error(format!("[ERROR] Unknown command kind: {}", kind)).wrapped("unknown")
            }
        }
    }
}
