//! In-memory [`FileManager`] for tests and dry runs

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{FileManager, apply_edits, edit_message, multi_edit_message, replace, select_lines};
use crate::command::EditSpec;
use crate::outcome::Outcome;

/// Files kept in a map keyed by the path as given
#[derive(Default)]
pub struct InMemoryFileManager {
    files: Mutex<BTreeMap<String, String>>,
}

impl InMemoryFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: Mutex::new(files.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Copy of every file currently held
    pub fn files(&self) -> BTreeMap<String, String> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn get(&self, path: &str) -> Result<String, Outcome> {
        let files = self
            .files
            .lock()
            .map_err(|_| Outcome::error(format!("Error reading file {}: lock poisoned", path)))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| Outcome::error(format!("File not found: {}", path)))
    }

    fn put(&self, path: &str, content: String) -> Result<(), Outcome> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| Outcome::error(format!("Error writing to file {}: lock poisoned", path)))?;
        files.insert(path.to_string(), content);
        Ok(())
    }
}

#[async_trait]
impl FileManager for InMemoryFileManager {
    async fn read(&self, path: &str, offset: Option<u64>, limit: Option<u64>) -> Outcome {
        debug!(%path, "InMemoryFileManager::read: called");
        match self.get(path) {
            Ok(content) => Outcome::success(select_lines(&content, offset, limit)),
            Err(outcome) => outcome,
        }
    }

    async fn write(&self, path: &str, content: &str) -> Outcome {
        debug!(%path, "InMemoryFileManager::write: called");
        match self.put(path, content.to_string()) {
            Ok(()) => Outcome::success(format!("Successfully wrote to file: {}", path)),
            Err(outcome) => outcome,
        }
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> Outcome {
        debug!(%path, "InMemoryFileManager::edit: called");
        let content = match self.get(path) {
            Ok(content) => content,
            Err(outcome) => return outcome,
        };
        let spec = EditSpec {
            old_string: old.to_string(),
            new_string: new.to_string(),
            replace_all,
        };
        let result = replace(&content, path, &spec)
            .map_err(Outcome::error)
            .and_then(|(updated, count)| self.put(path, updated).map(|_| count));
        match result {
            Ok(count) => Outcome::success(edit_message(count, path)),
            Err(outcome) => outcome,
        }
    }

    async fn multi_edit(&self, path: &str, edits: &[EditSpec]) -> Outcome {
        debug!(%path, "InMemoryFileManager::multi_edit: called");
        let content = match self.get(path) {
            Ok(content) => content,
            Err(outcome) => return outcome,
        };
        let result = apply_edits(&content, path, edits)
            .map_err(Outcome::error)
            .and_then(|(updated, total)| self.put(path, updated).map(|_| total));
        match result {
            Ok(total) => Outcome::success(multi_edit_message(edits.len(), total, path)),
            Err(outcome) => outcome,
        }
    }

    async fn delete(&self, path: &str) -> Outcome {
        debug!(%path, "InMemoryFileManager::delete: called");
        let removed = self.files.lock().ok().and_then(|mut files| files.remove(path));
        match removed {
            Some(_) => Outcome::success(format!("Successfully deleted file: {}", path)),
            None => Outcome::error(format!("File not found: {}", path)),
        }
    }

    async fn content(&self, path: &str) -> Option<String> {
        self.get(path).ok()
    }
}
