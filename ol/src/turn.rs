//! Conversation turns
//!
//! One turn: the model's reply is appended to the conversation, commands are
//! extracted from it and executed in order, and everything they printed is
//! sent back as the next user message. Shared by the optimiser and its
//! subagents; each supplies its own [`TurnExecutor`].

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::Command;
use crate::dispatch::ExecutionContext;
use crate::extract::Extractor;
use crate::llm::{CompletionRequest, Message, Role};
use crate::outcome::Outcome;

pub const NO_ACTIONS_MESSAGE: &str = "No valid actions found in the LLM response.";

/// System prompt plus the running message list
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Drop every turn and start over from `context`
    pub fn collapse(&mut self, context: impl Into<String>) {
        debug!(dropped = %self.messages.len(), "Conversation::collapse: called");
        self.messages.clear();
        self.push_user(context);
    }

    pub fn request(&self, max_tokens: u32, temperature: Option<f32>) -> CompletionRequest {
        CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.messages.clone(),
            max_tokens,
            temperature,
        }
    }

    /// Full history for storage, system prompt first
    pub fn to_messages(&self) -> Vec<Message> {
        let mut all = Vec::with_capacity(self.messages.len() + 1);
        all.push(Message::system(self.system_prompt.clone()));
        all.extend(self.messages.iter().cloned());
        all
    }

    /// Text of the latest assistant message
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// Executes the commands of a turn
#[async_trait]
pub trait TurnExecutor: Send {
    async fn execute(&mut self, command: Command, ctx: &mut ExecutionContext) -> Outcome;
}

/// Run one turn over `text`; returns true when a command asked to stop
///
/// Commands run sequentially in extraction order. Once a command sets the
/// terminate flag the rest of the batch is skipped; whatever was gathered up
/// to that point is still appended.
pub async fn process_turn(
    executor: &mut dyn TurnExecutor,
    extractor: &dyn Extractor,
    conversation: &mut Conversation,
    text: &str,
    ctx: &mut ExecutionContext,
) -> bool {
    debug!(len = %text.len(), "process_turn: called");
    conversation.push_assistant(text);

    let extraction = extractor.extract(text);
    ctx.set_batch(extraction.commands.iter().map(Command::kind));
    info!(
        commands = %extraction.commands.len(),
        errors = %extraction.errors.len(),
        "Extracted commands from response"
    );

    let mut response = String::new();
    if !extraction.found_any_candidate {
        response.push_str(NO_ACTIONS_MESSAGE);
        response.push('\n');
    }
    if !extraction.errors.is_empty() {
        response.push_str("Errors encountered while parsing actions:\n");
        for error in &extraction.errors {
            response.push_str(&format!("- {}\n", error));
        }
    }

    for command in extraction.commands {
        let outcome = executor.execute(command, ctx).await;
        if !outcome.content.is_empty() {
            response.push_str(&outcome.content);
            response.push('\n');
        }
        if ctx.should_terminate() {
            debug!("process_turn: terminate requested");
            push_response(conversation, response);
            return true;
        }
    }

    push_response(conversation, response);
    false
}

fn push_response(conversation: &mut Conversation, response: String) {
    if !response.trim().is_empty() {
        conversation.push_user(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use crate::extract::{CommandCatalog, JsonObjectExtractor};

    /// Echoes debug notes, terminates on finish
    #[derive(Default)]
    struct EchoExecutor {
        seen: Vec<CommandKind>,
    }

    #[async_trait]
    impl TurnExecutor for EchoExecutor {
        async fn execute(&mut self, command: Command, ctx: &mut ExecutionContext) -> Outcome {
            self.seen.push(command.kind());
            ctx.record(command.kind());
            match command {
                Command::Finish(_) => {
                    ctx.request_terminate();
                    Outcome::success("")
                }
                other => Outcome::success(format!("echo: {}", other.message().unwrap_or_default())),
            }
        }
    }

    fn extractor() -> JsonObjectExtractor {
        JsonObjectExtractor::new(CommandCatalog::optimiser())
    }

    #[tokio::test]
    async fn test_no_candidates_reports_no_actions() {
        let mut executor = EchoExecutor::default();
        let mut conversation = Conversation::new("sys");
        let mut ctx = ExecutionContext::new("run", 0);

        let done = process_turn(&mut executor, &extractor(), &mut conversation, "just thinking", &mut ctx).await;
        assert!(!done);
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[0], Message::assistant("just thinking"));
        assert_eq!(conversation.messages()[1].content, "No valid actions found in the LLM response.\n");
    }

    #[tokio::test]
    async fn test_outputs_and_errors_are_combined() {
        let mut executor = EchoExecutor::default();
        let mut conversation = Conversation::new("sys");
        let mut ctx = ExecutionContext::new("run", 0);
        let text = r#"{"action_type": "debug_log", "message": "one"} then {"action_type": "read"}"#;

        process_turn(&mut executor, &extractor(), &mut conversation, text, &mut ctx).await;
        let reply = &conversation.messages()[1].content;
        assert!(reply.starts_with("Errors encountered while parsing actions:\n- [read] Validation error"));
        assert!(reply.ends_with("echo: one\n"));
        assert_eq!(ctx.batch(), &[CommandKind::DebugLog]);
    }

    #[tokio::test]
    async fn test_terminal_command_skips_rest_of_batch() {
        let mut executor = EchoExecutor::default();
        let mut conversation = Conversation::new("sys");
        let mut ctx = ExecutionContext::new("run", 0);
        let text = r#"
{"action_type": "debug_log", "message": "first"}
{"action_type": "finish", "message": "done"}
{"action_type": "debug_log", "message": "never"}
"#;

        let done = process_turn(&mut executor, &extractor(), &mut conversation, text, &mut ctx).await;
        assert!(done);
        assert_eq!(executor.seen, vec![CommandKind::DebugLog, CommandKind::Finish]);
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[1].content, "echo: first\n");
    }

    #[tokio::test]
    async fn test_outputs_before_finish_are_kept() {
        let mut executor = EchoExecutor::default();
        let mut conversation = Conversation::new("sys");
        let mut ctx = ExecutionContext::new("run", 0);
        let text = r#"{"action_type": "read"} {"action_type": "finish", "message": "done"}"#;

        let done = process_turn(&mut executor, &extractor(), &mut conversation, text, &mut ctx).await;
        assert!(done);
        let reply = &conversation.messages()[1].content;
        assert!(reply.starts_with("Errors encountered while parsing actions:\n- [read] Validation error"));
    }

    #[tokio::test]
    async fn test_silent_finish_appends_nothing() {
        let mut executor = EchoExecutor::default();
        let mut conversation = Conversation::new("sys");
        let mut ctx = ExecutionContext::new("run", 0);
        let text = r#"{"action_type": "finish", "message": "done"}"#;

        assert!(process_turn(&mut executor, &extractor(), &mut conversation, text, &mut ctx).await);
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn test_collapse_keeps_system_prompt() {
        let mut conversation = Conversation::new("standing instructions");
        conversation.push_user("a");
        conversation.push_assistant("b");
        conversation.collapse("summary");

        assert_eq!(conversation.messages(), &[Message::user("summary")]);
        let stored = conversation.to_messages();
        assert_eq!(stored[0], Message::system("standing instructions"));
        assert_eq!(stored.len(), 2);
        assert!(conversation.last_assistant().is_none());
    }
}
