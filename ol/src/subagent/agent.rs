//! Subagent - a helper conversation with a read-only command set

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::{Command, CommandKind};
use crate::dispatch::handlers::FileHandler;
use crate::dispatch::{ExecutionContext, HandlerRegistry};
use crate::extract::{CommandCatalog, JsonObjectExtractor};
use crate::llm::LlmClient;
use crate::outcome::Outcome;
use crate::turn::{Conversation, TurnExecutor, process_turn};
use crate::workspace::FileManager;

/// Limits and sampling for helper conversations
#[derive(Debug, Clone)]
pub struct SubagentSettings {
    /// Turns per `run` or `continue_with_message` before giving up
    pub max_turns: u32,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub kind_field: String,
}

/// Terminal message a subagent ended its run with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: CommandKind,
    pub message: String,
}

impl Reply {
    /// The message, if the subagent used `report`
    pub fn report(self) -> Option<String> {
        (self.kind == CommandKind::Report).then_some(self.message)
    }
}

struct SubagentExecutor<'a> {
    registry: &'a HandlerRegistry,
    reply: Option<Reply>,
}

#[async_trait]
impl TurnExecutor for SubagentExecutor<'_> {
    async fn execute(&mut self, command: Command, ctx: &mut ExecutionContext) -> Outcome {
        let kind = command.kind();
        ctx.record(kind);
        if kind.is_terminal() {
            ctx.request_terminate();
            self.reply = command.message().map(|message| Reply {
                kind,
                message: message.to_string(),
            });
            return Outcome::success("");
        }
        self.registry.dispatch(&command, ctx).await
    }
}

/// Helper agent with its own conversation
pub struct Subagent {
    id: String,
    llm: Arc<dyn LlmClient>,
    registry: HandlerRegistry,
    extractor: JsonObjectExtractor,
    conversation: Conversation,
    settings: SubagentSettings,
}

impl Subagent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        files: Arc<dyn FileManager>,
        system_prompt: impl Into<String>,
        initial_message: impl Into<String>,
        settings: SubagentSettings,
    ) -> Self {
        let id = Uuid::now_v7().to_string();
        debug!(%id, "Subagent::new: called");

        let mut registry = HandlerRegistry::new();
        registry.register(CommandKind::Read, Arc::new(FileHandler::new(files)));

        let extractor = JsonObjectExtractor::new(CommandCatalog::subagent()).with_kind_field(settings.kind_field.clone());
        let mut conversation = Conversation::new(system_prompt);
        conversation.push_user(initial_message);

        Self {
            id,
            llm,
            registry,
            extractor,
            conversation,
            settings,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drive turns until the subagent reports or responds
    ///
    /// `None` means the turn limit was reached first.
    pub async fn run(&mut self) -> Result<Option<Reply>> {
        info!(id = %self.id, "Running subagent");
        self.run_until_finished().await
    }

    /// Send a follow-up and drive turns until the next reply
    pub async fn continue_with_message(&mut self, message: &str) -> Result<Option<Reply>> {
        debug!(id = %self.id, "Subagent::continue_with_message: called");
        self.conversation.push_user(message);
        self.run_until_finished().await
    }

    async fn run_until_finished(&mut self) -> Result<Option<Reply>> {
        let mut executor = SubagentExecutor {
            registry: &self.registry,
            reply: None,
        };

        for turn in 0..self.settings.max_turns {
            debug!(id = %self.id, %turn, "Subagent::run_until_finished: requesting completion");
            let request = self
                .conversation
                .request(self.settings.max_tokens, self.settings.temperature);
            let response = self.llm.complete(request).await?;

            let mut ctx = ExecutionContext::new(self.id.clone(), 0);
            let done = process_turn(
                &mut executor,
                &self.extractor,
                &mut self.conversation,
                &response.content,
                &mut ctx,
            )
            .await;
            if done {
                info!(id = %self.id, "Subagent completed");
                return Ok(executor.reply);
            }
        }

        warn!(id = %self.id, max_turns = %self.settings.max_turns, "Subagent reached its turn limit");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::workspace::InMemoryFileManager;

    fn settings(max_turns: u32) -> SubagentSettings {
        SubagentSettings {
            max_turns,
            max_tokens: 1000,
            temperature: None,
            kind_field: "action_type".to_string(),
        }
    }

    fn subagent(llm: Arc<MockLlmClient>, max_turns: u32) -> Subagent {
        let files = Arc::new(InMemoryFileManager::with_files([("agent.py", "TOOLS = []")]));
        Subagent::new(llm, files, "analyse", "trajectory here", settings(max_turns))
    }

    #[tokio::test]
    async fn test_reads_then_reports() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "read", "file_path": "agent.py"}"#,
            r#"{"action_type": "report", "message": "The agent has no tools."}"#,
        ]));
        let mut agent = subagent(llm.clone(), 5);

        let reply = agent.run().await.unwrap().unwrap();
        assert_eq!(reply.clone().report().as_deref(), Some("The agent has no tools."));
        assert_eq!(llm.call_count(), 2);

        let second = &llm.requests()[1];
        assert_eq!(second.system_prompt, "analyse");
        assert!(second.messages[2].content.contains("<file_read_agent.py_output>"));
        assert!(second.messages[2].content.contains("TOOLS = []"));
    }

    #[tokio::test]
    async fn test_write_is_not_available() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "write", "file_path": "agent.py", "content": "x"}"#,
            r#"{"action_type": "respond", "message": "ok"}"#,
        ]));
        let mut agent = subagent(llm.clone(), 5);

        let reply = agent.run().await.unwrap().unwrap();
        assert_eq!(reply.kind, CommandKind::Respond);
        assert!(reply.report().is_none());
        let feedback = &llm.requests()[1].messages[2].content;
        assert!(feedback.contains("Errors encountered while parsing actions"));
    }

    #[tokio::test]
    async fn test_turn_limit() {
        let llm = Arc::new(MockLlmClient::texts(&["thinking", "still thinking", "never asked"]));
        let mut agent = subagent(llm.clone(), 2);

        assert!(agent.run().await.unwrap().is_none());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_continue_appends_message() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"action_type": "report", "message": "first"}"#,
            r#"{"action_type": "respond", "message": "second"}"#,
        ]));
        let mut agent = subagent(llm.clone(), 3);
        agent.run().await.unwrap();

        let reply = agent.continue_with_message("Which step failed?").await.unwrap().unwrap();
        assert_eq!(reply.message, "second");
        let messages = agent.conversation().messages();
        assert_eq!(messages[2].content, "Which step failed?");
        assert_eq!(messages.len(), 4);
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let llm = Arc::new(MockLlmClient::texts(&[]));
        let mut agent = subagent(llm, 3);
        assert!(agent.run().await.is_err());
    }
}
