//! [`RunStore`]-backed persistence

use std::path::Path;

use async_trait::async_trait;
use eyre::Result;
use runstore::{RunMeta, RunStore};
use tracing::debug;

use super::{EvalStore, MessageStore};
use crate::eval::SuiteResult;
use crate::llm::Message;

/// Stores runs on disk under one directory per run
pub struct FileStore {
    store: RunStore,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "FileStore::open: called");
        Ok(Self {
            store: RunStore::open(path)?,
        })
    }

    /// Stored runs, most recently updated first
    pub fn list_runs(&self) -> Result<Vec<RunMeta>> {
        self.store.list_runs()
    }

    /// Iterations of `run_id` with stored eval results, ascending
    pub fn iterations(&self, run_id: &str) -> Result<Vec<u32>> {
        self.store.list_iterations(run_id)
    }
}

#[async_trait]
impl EvalStore for FileStore {
    async fn put_eval_results(&self, run_id: &str, iteration: u32, result: &SuiteResult) -> Result<()> {
        debug!(%run_id, %iteration, "FileStore::put_eval_results: called");
        self.store.put_iteration(run_id, iteration, result)
    }

    async fn get_eval_results(&self, run_id: &str, iteration: u32) -> Result<Option<SuiteResult>> {
        debug!(%run_id, %iteration, "FileStore::get_eval_results: called");
        self.store.get_iteration(run_id, iteration)
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn put_messages(&self, run_id: &str, messages: &[Message]) -> Result<()> {
        debug!(%run_id, count = %messages.len(), "FileStore::put_messages: called");
        self.store.put_messages(run_id, messages)
    }

    async fn get_messages(&self, run_id: &str) -> Result<Option<Vec<Message>>> {
        debug!(%run_id, "FileStore::get_messages: called");
        self.store.get_messages(run_id)
    }
}
