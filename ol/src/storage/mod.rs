//! Persistence boundary for eval results and message histories

mod file;
mod memory;

use async_trait::async_trait;
use eyre::Result;

use crate::eval::SuiteResult;
use crate::llm::Message;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Eval results keyed by run and iteration
#[async_trait]
pub trait EvalStore: Send + Sync {
    async fn put_eval_results(&self, run_id: &str, iteration: u32, result: &SuiteResult) -> Result<()>;

    async fn get_eval_results(&self, run_id: &str, iteration: u32) -> Result<Option<SuiteResult>>;
}

/// Full conversation history keyed by run
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn put_messages(&self, run_id: &str, messages: &[Message]) -> Result<()>;

    async fn get_messages(&self, run_id: &str) -> Result<Option<Vec<Message>>>;
}
