//! File commands: read, write, edit, multi_edit

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::unsupported;
use crate::command::Command;
use crate::dispatch::{ExecutionContext, Handler};
use crate::outcome::Outcome;
use crate::workspace::FileManager;

pub struct FileHandler {
    files: Arc<dyn FileManager>,
}

impl FileHandler {
    pub fn new(files: Arc<dyn FileManager>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Handler for FileHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn handle(&self, command: &Command, _ctx: &mut ExecutionContext) -> Outcome {
        debug!(kind = %command.kind(), "FileHandler::handle: called");
        match command {
            Command::Read(read) => self
                .files
                .read(&read.file_path, read.offset, read.limit)
                .await
                .wrapped(&format!("file_read_{}", read.file_path)),
            Command::Write(write) => self
                .files
                .write(&write.file_path, &write.content)
                .await
                .wrapped(&format!("file_write_{}", write.file_path)),
            Command::Edit(edit) => self
                .files
                .edit(&edit.file_path, &edit.old_string, &edit.new_string, edit.replace_all)
                .await
                .wrapped(&format!("file_edit_{}", edit.file_path)),
            Command::MultiEdit(multi) => self
                .files
                .multi_edit(&multi.file_path, &multi.edits)
                .await
                .wrapped("multi_edit"),
            other => unsupported(self.name(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, EditSpec, MultiEditFile, ReadFile, WriteFile};
    use crate::workspace::InMemoryFileManager;

    fn handler(files: &Arc<InMemoryFileManager>) -> FileHandler {
        FileHandler::new(files.clone())
    }

    #[tokio::test]
    async fn test_read_wraps_with_path() {
        let files = Arc::new(InMemoryFileManager::with_files([("a.py", "print(1)")]));
        let mut ctx = ExecutionContext::new("run", 0);
        let command = Command::Read(ReadFile {
            file_path: "a.py".to_string(),
            offset: None,
            limit: None,
        });

        let outcome = handler(&files).handle(&command, &mut ctx).await;
        assert!(!outcome.is_error);
        assert!(outcome.content.starts_with("<file_read_a.py_output>\n"));
        assert!(outcome.content.contains("print(1)"));
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let files = Arc::new(InMemoryFileManager::new());
        let mut ctx = ExecutionContext::new("run", 0);
        let command = Command::Read(ReadFile {
            file_path: "nope.py".to_string(),
            offset: None,
            limit: None,
        });

        let outcome = handler(&files).handle(&command, &mut ctx).await;
        assert!(outcome.is_error);
        assert!(outcome.content.starts_with("<file_read_nope.py_output>"));
    }

    #[tokio::test]
    async fn test_write_then_multi_edit() {
        let files = Arc::new(InMemoryFileManager::new());
        let handler = handler(&files);
        let mut ctx = ExecutionContext::new("run", 0);

        let write = Command::Write(WriteFile {
            file_path: "p.txt".to_string(),
            content: "alpha beta".to_string(),
        });
        let outcome = handler.handle(&write, &mut ctx).await;
        assert!(!outcome.is_error);
        assert!(outcome.content.starts_with("<file_write_p.txt_output>"));

        let multi = Command::MultiEdit(MultiEditFile {
            file_path: "p.txt".to_string(),
            edits: vec![
                EditSpec {
                    old_string: "alpha".to_string(),
                    new_string: "gamma".to_string(),
                    replace_all: false,
                },
                EditSpec {
                    old_string: "beta".to_string(),
                    new_string: "delta".to_string(),
                    replace_all: false,
                },
            ],
        });
        let outcome = handler.handle(&multi, &mut ctx).await;
        assert!(!outcome.is_error, "{}", outcome.content);
        assert!(outcome.content.starts_with("<multi_edit_output>"));
        assert_eq!(files.files()["p.txt"], "gamma delta");
    }

    #[tokio::test]
    async fn test_foreign_command_is_unknown() {
        let files = Arc::new(InMemoryFileManager::new());
        let mut ctx = ExecutionContext::new("run", 0);
        let command = Command::from_value(CommandKind::Finish, serde_json::json!({"message": "done"})).unwrap();

        let outcome = handler(&files).handle(&command, &mut ctx).await;
        assert!(outcome.is_error);
        assert!(outcome.content.starts_with("<unknown_output>"));
    }
}
