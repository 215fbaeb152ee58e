//! File and shell collaborators
//!
//! The optimiser touches the target system only through these traits. Every
//! operation reports an [`Outcome`]; nothing here returns `Err`.

mod local;
mod memory;
mod shell;

use async_trait::async_trait;

use crate::command::EditSpec;
use crate::outcome::Outcome;

pub use local::LocalFileManager;
pub use memory::InMemoryFileManager;
pub use shell::LocalShell;

/// File operations on the system being optimised
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Read a file, optionally a window of `limit` lines starting at line `offset`
    async fn read(&self, path: &str, offset: Option<u64>, limit: Option<u64>) -> Outcome;

    /// Create or replace a file
    async fn write(&self, path: &str, content: &str) -> Outcome;

    /// Replace `old` with `new`; `old` must be unique unless `replace_all`
    async fn edit(&self, path: &str, old: &str, new: &str, replace_all: bool) -> Outcome;

    /// Apply edits in order; nothing is written if any edit fails
    async fn multi_edit(&self, path: &str, edits: &[EditSpec]) -> Outcome;

    async fn delete(&self, path: &str) -> Outcome;

    /// Raw content, `None` if the file does not exist or cannot be read
    async fn content(&self, path: &str) -> Option<String>;
}

/// Command execution on the system being optimised
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn execute(&self, cmd: &str, block: bool, timeout_secs: u64) -> Outcome;
}

/// Lines `offset..offset + limit`, keeping line endings
pub(crate) fn select_lines(content: &str, offset: Option<u64>, limit: Option<u64>) -> String {
    let start = offset.unwrap_or(0) as usize;
    let lines = content.split_inclusive('\n').skip(start);
    match limit {
        Some(limit) => lines.take(limit as usize).collect(),
        None => lines.collect(),
    }
}

/// Apply one replacement, returning the new content and replacement count
pub(crate) fn replace(content: &str, path: &str, edit: &EditSpec) -> Result<(String, usize), String> {
    let count = content.matches(edit.old_string.as_str()).count();
    if count == 0 {
        return Err(format!("String not found in file: {}", path));
    }
    if !edit.replace_all && count > 1 {
        return Err(format!(
            "String appears {} times in file. Use replace_all=true to replace all occurrences.",
            count
        ));
    }

    if edit.replace_all {
        Ok((content.replace(&edit.old_string, &edit.new_string), count))
    } else {
        Ok((content.replacen(&edit.old_string, &edit.new_string, 1), 1))
    }
}

/// Apply edits in order, returning the new content and total replacements
pub(crate) fn apply_edits(content: &str, path: &str, edits: &[EditSpec]) -> Result<(String, usize), String> {
    if edits.is_empty() {
        return Err("No edits provided".to_string());
    }

    let mut current = content.to_string();
    let mut total = 0;
    for (i, edit) in edits.iter().enumerate() {
        let (next, count) =
            replace(&current, path, edit).map_err(|e| format!("Edit {}/{} failed: {}", i + 1, edits.len(), e))?;
        current = next;
        total += count;
    }
    Ok((current, total))
}

pub(crate) fn edit_message(count: usize, path: &str) -> String {
    format!("Successfully replaced {} occurrence(s) in {}", count, path)
}

pub(crate) fn multi_edit_message(edits: usize, total: usize, path: &str) -> String {
    format!(
        "Successfully applied {} edit(s) with {} total replacement(s) in {}",
        edits, total, path
    )
}
