//! In-process store, used by tests and dry runs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tracing::debug;

use super::{EvalStore, MessageStore};
use crate::eval::SuiteResult;
use crate::llm::Message;

#[derive(Default)]
pub struct MemoryStore {
    evals: Mutex<HashMap<(String, u32), SuiteResult>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvalStore for MemoryStore {
    async fn put_eval_results(&self, run_id: &str, iteration: u32, result: &SuiteResult) -> Result<()> {
        debug!(%run_id, %iteration, "MemoryStore::put_eval_results: called");
        self.evals
            .lock()
            .map_err(|_| eyre!("eval store lock poisoned"))?
            .insert((run_id.to_string(), iteration), result.clone());
        Ok(())
    }

    async fn get_eval_results(&self, run_id: &str, iteration: u32) -> Result<Option<SuiteResult>> {
        debug!(%run_id, %iteration, "MemoryStore::get_eval_results: called");
        let evals = self.evals.lock().map_err(|_| eyre!("eval store lock poisoned"))?;
        Ok(evals.get(&(run_id.to_string(), iteration)).cloned())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn put_messages(&self, run_id: &str, messages: &[Message]) -> Result<()> {
        debug!(%run_id, count = %messages.len(), "MemoryStore::put_messages: called");
        self.messages
            .lock()
            .map_err(|_| eyre!("message store lock poisoned"))?
            .insert(run_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn get_messages(&self, run_id: &str) -> Result<Option<Vec<Message>>> {
        debug!(%run_id, "MemoryStore::get_messages: called");
        let messages = self.messages.lock().map_err(|_| eyre!("message store lock poisoned"))?;
        Ok(messages.get(run_id).cloned())
    }
}
