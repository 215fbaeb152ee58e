//! Shell command handler

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::unsupported;
use crate::command::Command;
use crate::dispatch::{ExecutionContext, Handler};
use crate::outcome::Outcome;
use crate::workspace::ShellExecutor;

pub struct ShellHandler {
    shell: Arc<dyn ShellExecutor>,
}

impl ShellHandler {
    pub fn new(shell: Arc<dyn ShellExecutor>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Handler for ShellHandler {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn handle(&self, command: &Command, _ctx: &mut ExecutionContext) -> Outcome {
        let Command::Bash(bash) = command else {
            return unsupported(self.name(), command);
        };
        debug!(cmd = %bash.cmd, block = %bash.block, "ShellHandler::handle: called");
        self.shell
            .execute(&bash.cmd, bash.block, bash.timeout_secs)
            .await
            .wrapped("bash")
    }
}
