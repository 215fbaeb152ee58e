//! LLM client boundary

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod retry;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client for the configured provider, wrapped with overload retry
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    let inner: Arc<dyn LlmClient> = match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Arc::new(AnthropicClient::from_config(config)?)
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            return Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic",
                other
            )));
        }
    };

    let policy = RetryPolicy {
        max_attempts: config.max_retries.max(1),
        base_delay: Duration::from_millis(config.retry_base_delay_ms),
        ..RetryPolicy::default()
    };
    Ok(Arc::new(RetryingClient::new(inner, policy)))
}
