//! Filesystem-backed [`FileManager`]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{FileManager, apply_edits, edit_message, multi_edit_message, replace, select_lines};
use crate::command::EditSpec;
use crate::outcome::Outcome;

/// Resolves relative paths against a root directory
pub struct LocalFileManager {
    root: PathBuf,
}

impl LocalFileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "LocalFileManager::new: called");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    /// Read an existing regular file, or the error outcome to return
    async fn load(&self, path: &str) -> Result<(PathBuf, String), Outcome> {
        let resolved = self.resolve(path);
        let meta = match fs::metadata(&resolved).await {
            Ok(meta) => meta,
            Err(_) => return Err(Outcome::error(format!("File not found: {}", path))),
        };
        if !meta.is_file() {
            return Err(Outcome::error(format!("Path is not a file: {}", path)));
        }

        match fs::read_to_string(&resolved).await {
            Ok(content) => Ok((resolved, content)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(Outcome::error(format!("Unable to decode file as UTF-8: {}", path)))
            }
            Err(e) => Err(Outcome::error(format!("Error reading file {}: {}", path, e))),
        }
    }

    async fn store(&self, resolved: &Path, path: &str, content: &str) -> Result<(), Outcome> {
        fs::write(resolved, content)
            .await
            .map_err(|e| Outcome::error(format!("Error writing to file {}: {}", path, e)))
    }
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn read(&self, path: &str, offset: Option<u64>, limit: Option<u64>) -> Outcome {
        debug!(%path, ?offset, ?limit, "LocalFileManager::read: called");
        match self.load(path).await {
            Ok((_, content)) => Outcome::success(select_lines(&content, offset, limit)),
            Err(outcome) => outcome,
        }
    }

    async fn write(&self, path: &str, content: &str) -> Outcome {
        debug!(%path, len = %content.len(), "LocalFileManager::write: called");
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            return Outcome::error(format!("Error writing to file {}: {}", path, e));
        }

        match self.store(&resolved, path, content).await {
            Ok(()) => Outcome::success(format!("Successfully wrote to file: {}", path)),
            Err(outcome) => outcome,
        }
    }

    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> Outcome {
        debug!(%path, %replace_all, "LocalFileManager::edit: called");
        let (resolved, content) = match self.load(path).await {
            Ok(loaded) => loaded,
            Err(outcome) => return outcome,
        };

        let spec = EditSpec {
            old_string: old.to_string(),
            new_string: new.to_string(),
            replace_all,
        };
        let (updated, count) = match replace(&content, path, &spec) {
            Ok(result) => result,
            Err(message) => {
                warn!(%path, "Edit target not found or ambiguous");
                return Outcome::error(message);
            }
        };

        match self.store(&resolved, path, &updated).await {
            Ok(()) => Outcome::success(edit_message(count, path)),
            Err(outcome) => outcome,
        }
    }

    async fn multi_edit(&self, path: &str, edits: &[EditSpec]) -> Outcome {
        debug!(%path, edit_count = %edits.len(), "LocalFileManager::multi_edit: called");
        let (resolved, content) = match self.load(path).await {
            Ok(loaded) => loaded,
            Err(outcome) => return outcome,
        };

        let (updated, total) = match apply_edits(&content, path, edits) {
            Ok(result) => result,
            Err(message) => {
                warn!(%path, %message, "Multi-edit failed");
                return Outcome::error(message);
            }
        };

        match self.store(&resolved, path, &updated).await {
            Ok(()) => Outcome::success(multi_edit_message(edits.len(), total, path)),
            Err(outcome) => outcome,
        }
    }

    async fn delete(&self, path: &str) -> Outcome {
        debug!(%path, "LocalFileManager::delete: called");
        let resolved = self.resolve(path);
        match fs::metadata(&resolved).await {
            Err(_) => return Outcome::error(format!("File not found: {}", path)),
            Ok(meta) if !meta.is_file() => return Outcome::error(format!("Path is not a file: {}", path)),
            Ok(_) => {}
        }

        match fs::remove_file(&resolved).await {
            Ok(()) => Outcome::success(format!("Successfully deleted file: {}", path)),
            Err(e) => Outcome::error(format!("Error deleting file {}: {}", path, e)),
        }
    }

    async fn content(&self, path: &str) -> Option<String> {
        debug!(%path, "LocalFileManager::content: called");
        self.load(path).await.ok().map(|(_, content)| content)
    }
}
