//! Payload types, one per command kind
//!
//! Every type rejects unknown fields and checks its own constraints in
//! [`Validate::validate`]; a value that fails validation never becomes a
//! [`Command`](super::Command).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum shell timeout accepted from a command
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Minimum length of a rollback justification
pub const MIN_RESET_REASON_LEN: usize = 50;

/// Field-level constraint check
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::field(field, "must not be empty"));
    }
    Ok(())
}

fn at_least(field: &'static str, value: u64, min: u64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::field(field, format!("must be >= {}, got {}", min, value)));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

fn default_timeout() -> u64 {
    1
}

fn default_evals() -> Vec<String> {
    vec!["all".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFile {
    #[serde(alias = "file")]
    pub file_path: String,
    /// First line to return (0-based)
    #[serde(default)]
    pub offset: Option<u64>,
    /// Maximum number of lines to return
    #[serde(default)]
    pub limit: Option<u64>,
}

impl Validate for ReadFile {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("file_path", &self.file_path)?;
        if let Some(limit) = self.limit {
            at_least("limit", limit, 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFile {
    #[serde(alias = "file")]
    pub file_path: String,
    pub content: String,
}

impl Validate for WriteFile {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("file_path", &self.file_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditFile {
    #[serde(alias = "file")]
    pub file_path: String,
    #[serde(alias = "old")]
    pub old_string: String,
    #[serde(alias = "new")]
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

impl Validate for EditFile {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("file_path", &self.file_path)
    }
}

/// One replacement inside a multi-edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditSpec {
    #[serde(alias = "old")]
    pub old_string: String,
    #[serde(alias = "new")]
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiEditFile {
    #[serde(alias = "file")]
    pub file_path: String,
    pub edits: Vec<EditSpec>,
}

impl Validate for MultiEditFile {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("file_path", &self.file_path)?;
        if self.edits.is_empty() {
            return Err(ValidationError::field("edits", "at least one edit is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bash {
    #[serde(alias = "command")]
    pub cmd: String,
    /// Wait for the command to complete
    #[serde(default = "default_true")]
    pub block: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Validate for Bash {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("cmd", &self.cmd)?;
        at_least("timeout_secs", self.timeout_secs, 1)?;
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ValidationError::field(
                "timeout_secs",
                format!("must be <= {}, got {}", MAX_TIMEOUT_SECS, self.timeout_secs),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugLog {
    pub message: String,
}

impl Validate for DebugLog {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("message", &self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunEvalSuite {
    /// Eval names to run, or `["all"]`
    #[serde(default = "default_evals")]
    pub evals_to_run: Vec<String>,
    #[serde(default = "default_one")]
    pub num_attempts: u32,
}

impl Default for RunEvalSuite {
    fn default() -> Self {
        Self {
            evals_to_run: default_evals(),
            num_attempts: 1,
        }
    }
}

impl Validate for RunEvalSuite {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.evals_to_run.is_empty() {
            return Err(ValidationError::field("evals_to_run", "at least one eval is required"));
        }
        at_least("num_attempts", self.num_attempts as u64, 1)
    }
}

/// Structured edits to the project breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakdownUpdates {
    /// File path -> new description
    #[serde(default)]
    pub files: Option<BTreeMap<String, String>>,
    /// Action name -> new description
    #[serde(default)]
    pub actions: Option<BTreeMap<String, String>>,
    /// Eval name -> reason it is not worth pursuing
    #[serde(default)]
    pub known_limitations: Option<BTreeMap<String, String>>,
}

impl BreakdownUpdates {
    pub fn is_empty(&self) -> bool {
        self.files.as_ref().is_none_or(|m| m.is_empty())
            && self.actions.as_ref().is_none_or(|m| m.is_empty())
            && self.known_limitations.as_ref().is_none_or(|m| m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndIteration {
    pub changelog_entry: String,
    pub project_breakdown_updates: BreakdownUpdates,
}

impl Validate for EndIteration {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectBreakdown {
    pub updates: BreakdownUpdates,
}

impl Validate for UpdateProjectBreakdown {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetToIteration {
    /// Iteration to restore; 0 is the baseline
    pub iteration_number: u32,
    pub reason: String,
}

impl Validate for ResetToIteration {
    fn validate(&self) -> Result<(), ValidationError> {
        let len = self.reason.chars().count();
        if len < MIN_RESET_REASON_LEN {
            return Err(ValidationError::field(
                "reason",
                format!("must be at least {} characters, got {}", MIN_RESET_REASON_LEN, len),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchTrajAnalysis {
    pub initial_message: String,
    pub iteration_number: u32,
    pub eval_name: String,
    /// 1-based attempt index
    #[serde(default = "default_one")]
    pub attempt_number: u32,
}

impl Validate for DispatchTrajAnalysis {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("initial_message", &self.initial_message)?;
        non_empty("eval_name", &self.eval_name)?;
        at_least("attempt_number", self.attempt_number as u64, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendSubagentMessage {
    pub subagent_id: String,
    pub message: String,
}

impl Validate for SendSubagentMessage {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("subagent_id", &self.subagent_id)?;
        non_empty("message", &self.message)
    }
}

/// Payload shared by `finish`, `report` and `respond`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub message: String,
}

impl Validate for Message {
    fn validate(&self) -> Result<(), ValidationError> {
        non_empty("message", &self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_bash_defaults() {
        let bash: Bash = decode(json!({"cmd": "ls"}));
        assert!(bash.block);
        assert_eq!(bash.timeout_secs, 1);
        assert!(bash.validate().is_ok());
    }

    #[test]
    fn test_bash_timeout_bounds() {
        let bash: Bash = decode(json!({"cmd": "ls", "timeout_secs": 301}));
        assert!(bash.validate().is_err());

        let bash: Bash = decode(json!({"cmd": "ls", "timeout_secs": 0}));
        assert!(bash.validate().is_err());

        let bash: Bash = decode(json!({"cmd": "ls", "timeout_secs": 300}));
        assert!(bash.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<WriteFile, _> = serde_json::from_value(json!({
            "file_path": "a.txt",
            "content": "x",
            "mode": "append"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_limit_must_be_positive() {
        let read: ReadFile = decode(json!({"file_path": "a.txt", "limit": 0}));
        assert!(read.validate().is_err());

        let read: ReadFile = decode(json!({"file_path": "a.txt", "offset": 0, "limit": 10}));
        assert!(read.validate().is_ok());
    }

    #[test]
    fn test_read_negative_offset_rejected() {
        let result: Result<ReadFile, _> = serde_json::from_value(json!({"file_path": "a.txt", "offset": -1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_edit_short_aliases() {
        let edit: EditFile = decode(json!({"file": "a.py", "old": "x", "new": "y"}));
        assert_eq!(edit.file_path, "a.py");
        assert_eq!(edit.old_string, "x");
        assert_eq!(edit.new_string, "y");
        assert!(!edit.replace_all);
    }

    #[test]
    fn test_multi_edit_requires_edits() {
        let multi: MultiEditFile = decode(json!({"file_path": "a.py", "edits": []}));
        assert!(multi.validate().is_err());
    }

    #[test]
    fn test_reset_reason_length() {
        let reset: ResetToIteration = decode(json!({"iteration_number": 0, "reason": "too short"}));
        assert!(reset.validate().is_err());

        let reset: ResetToIteration = decode(json!({
            "iteration_number": 0,
            "reason": "x".repeat(MIN_RESET_REASON_LEN)
        }));
        assert!(reset.validate().is_ok());
    }

    #[test]
    fn test_run_eval_suite_defaults() {
        let run: RunEvalSuite = decode(json!({}));
        assert_eq!(run.evals_to_run, vec!["all".to_string()]);
        assert_eq!(run.num_attempts, 1);

        let run: RunEvalSuite = decode(json!({"evals_to_run": []}));
        assert!(run.validate().is_err());
    }

    #[test]
    fn test_breakdown_updates_is_empty() {
        assert!(BreakdownUpdates::default().is_empty());

        let updates: BreakdownUpdates = decode(json!({"files": {}}));
        assert!(updates.is_empty());

        let updates: BreakdownUpdates = decode(json!({"known_limitations": {"eval-a": "model cannot count"}}));
        assert!(!updates.is_empty());
    }
}
