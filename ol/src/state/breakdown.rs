//! Project breakdown - the live description of the system being optimised
//!
//! Loaded once from a YAML file. The raw text is kept verbatim for rendering;
//! the parsed maps are what updates, snapshots and rollbacks operate on.
//! `Clone` is a full deep copy, so a snapshot never shares containers with
//! the live value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A parameter of an action available to the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// An action available to the target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableAction {
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ActionParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingGuideline {
    pub description: String,
}

/// An eval marked as not worth pursuing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownLimitation {
    pub eval_name: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct LimitationEntry {
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BreakdownDocument {
    key_files: BTreeMap<String, KeyFile>,
    available_actions: BTreeMap<String, AvailableAction>,
    editing_guidelines: BTreeMap<String, EditingGuideline>,
    known_limitations: BTreeMap<String, LimitationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBreakdown {
    pub key_files: BTreeMap<String, KeyFile>,
    pub available_actions: BTreeMap<String, AvailableAction>,
    pub editing_guidelines: BTreeMap<String, EditingGuideline>,
    pub known_limitations: BTreeMap<String, KnownLimitation>,
    raw_yaml: String,
    file_path: Option<PathBuf>,
}

impl ProjectBreakdown {
    /// Load a breakdown from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "ProjectBreakdown::load: called");
        if !path.exists() {
            return Err(eyre!("Project breakdown file not found: {}", path.display()));
        }
        let raw = std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        let mut breakdown = Self::parse(&raw)?;
        breakdown.file_path = Some(path.to_path_buf());
        Ok(breakdown)
    }

    /// Parse breakdown YAML; the root must be a mapping
    pub fn parse(raw: &str) -> Result<Self> {
        debug!(len = %raw.len(), "ProjectBreakdown::parse: called");
        let root: serde_yaml::Value = serde_yaml::from_str(raw).context("Failed to parse project breakdown YAML")?;
        if !root.is_mapping() {
            return Err(eyre!("Expected project breakdown YAML root to be a mapping"));
        }
        let doc: BreakdownDocument = serde_yaml::from_value(root).context("Invalid project breakdown")?;

        Ok(Self {
            key_files: doc.key_files,
            available_actions: doc.available_actions,
            editing_guidelines: doc.editing_guidelines,
            known_limitations: doc
                .known_limitations
                .into_iter()
                .map(|(name, entry)| {
                    let limitation = KnownLimitation {
                        eval_name: name.clone(),
                        reason: entry.reason,
                    };
                    (name, limitation)
                })
                .collect(),
            raw_yaml: raw.to_string(),
            file_path: None,
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Paths tracked by snapshots
    pub fn tracked_files(&self) -> impl Iterator<Item = &str> {
        self.key_files.keys().map(String::as_str)
    }

    pub fn update_file(&mut self, path: &str, description: &str) {
        debug!(%path, "ProjectBreakdown::update_file: called");
        self.key_files.insert(
            path.to_string(),
            KeyFile {
                description: description.to_string(),
            },
        );
    }

    /// Update an action's description, keeping its parameters; a new action
    /// starts without parameters
    pub fn update_action(&mut self, name: &str, description: &str) {
        debug!(%name, "ProjectBreakdown::update_action: called");
        self.available_actions
            .entry(name.to_string())
            .and_modify(|action| action.description = description.to_string())
            .or_insert_with(|| AvailableAction {
                description: description.to_string(),
                parameters: BTreeMap::new(),
            });
    }

    pub fn add_known_limitation(&mut self, eval_name: &str, reason: &str) {
        debug!(%eval_name, "ProjectBreakdown::add_known_limitation: called");
        self.known_limitations.insert(
            eval_name.to_string(),
            KnownLimitation {
                eval_name: eval_name.to_string(),
                reason: reason.to_string(),
            },
        );
    }

    /// Replace every field with a deep copy of `other`
    pub fn restore_from(&mut self, other: &ProjectBreakdown) {
        debug!("ProjectBreakdown::restore_from: called");
        *self = other.clone();
    }

    /// The YAML text followed by any known limitations
    pub fn to_str(&self) -> String {
        let mut out = self.raw_yaml.clone();
        if !self.known_limitations.is_empty() {
            out.push_str("\nknown_limitations:\n");
            for (name, limitation) in &self.known_limitations {
                out.push_str(&format!("  {}:\n    reason: {}\n", name, limitation.reason));
            }
        }
        out
    }

    /// One line per action: `- name: description [Params: p (type), ...]`
    pub fn actions_to_str(&self) -> String {
        self.available_actions
            .iter()
            .map(|(name, action)| {
                let params = action
                    .parameters
                    .iter()
                    .map(|(param, spec)| format!("{} ({})", param, spec.kind))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- {}: {} [Params: {}]", name, action.description, params)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"key_files:
  prompts/system.txt:
    description: System prompt of the agent
  agent.py:
    description: Agent loop
available_actions:
  search:
    description: Search the index
    parameters:
      query:
        type: string
        description: Search terms
      mode:
        type: string
        description: Match mode
        options: [exact, fuzzy]
editing_guidelines:
  tone:
    description: Keep prompts short
"#;
