//! Command extraction engine
//!
//! Turns free-form generated text into validated [`Command`]s. Two
//! interchangeable strategies implement [`Extractor`]:
//!
//! - [`TaggedBlockExtractor`]: `<kind>` ... `</kind>` blocks at line starts with
//!   a YAML body
//! - [`JsonObjectExtractor`]: JSON objects carrying a kind field, embedded
//!   anywhere in the text
//!
//! Neither strategy aborts on a bad payload. Every malformed or unknown item
//! becomes one entry in [`Extraction::errors`] and scanning carries on.

mod json;
mod tagged;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::command::{Command, CommandKind, ValidationError};

pub use json::{DEFAULT_KIND_FIELD, JsonObjectExtractor};
pub use tagged::{DEFAULT_IGNORED_TAGS, TaggedBlockExtractor};

/// Result of running an extractor over one piece of text
#[derive(Debug, Default)]
pub struct Extraction {
    /// Valid commands, in the order they appeared
    pub commands: Vec<Command>,
    /// One message per rejected candidate
    pub errors: Vec<String>,
    /// True when at least one tag or kind was detected, ignored or not
    pub found_any_candidate: bool,
}

/// Strategy for pulling commands out of generated text
pub trait Extractor: Send + Sync {
    fn extract(&self, text: &str) -> Extraction;
}

/// Which extraction strategy a conversation uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    #[default]
    Json,
    Tagged,
}

impl ExtractionStrategy {
    /// Build an extractor for `catalog`; `kind_field` only applies to JSON
    pub fn build(self, catalog: CommandCatalog, kind_field: &str) -> Box<dyn Extractor> {
        debug!(?self, %kind_field, "ExtractionStrategy::build: called");
        match self {
            Self::Json => Box::new(JsonObjectExtractor::new(catalog).with_kind_field(kind_field)),
            Self::Tagged => Box::new(TaggedBlockExtractor::new(catalog)),
        }
    }
}

/// The set of command kinds a conversation may issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    kinds: BTreeSet<CommandKind>,
}

impl CommandCatalog {
    /// Catalogue of the optimiser conversation
    pub fn optimiser() -> Self {
        Self::of(&[
            CommandKind::Read,
            CommandKind::Write,
            CommandKind::Edit,
            CommandKind::MultiEdit,
            CommandKind::Bash,
            CommandKind::DebugLog,
            CommandKind::RunEvalSuite,
            CommandKind::EndIteration,
            CommandKind::UpdateProjectBreakdown,
            CommandKind::ResetToIteration,
            CommandKind::DispatchTrajAnalysisAgent,
            CommandKind::SendSubagentMessage,
            CommandKind::Finish,
        ])
    }

    /// Catalogue of a trajectory analysis subagent
    pub fn subagent() -> Self {
        Self::of(&[CommandKind::Read, CommandKind::Report, CommandKind::Respond])
    }

    pub fn of(kinds: &[CommandKind]) -> Self {
        Self {
            kinds: kinds.iter().copied().collect(),
        }
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Resolve a name to a kind that belongs to this catalogue
    pub fn resolve(&self, name: &str) -> Option<CommandKind> {
        CommandKind::parse(name).filter(|kind| self.contains(*kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = CommandKind> + '_ {
        self.kinds.iter().copied()
    }
}

/// A detected `(kind, payload)` pair before validation
#[derive(Debug)]
pub(crate) struct Candidate {
    pub kind: String,
    pub payload: Result<Value, String>,
}

/// Validate detected candidates against a catalogue
pub(crate) fn assemble(catalog: &CommandCatalog, ignored: &[String], candidates: Vec<Candidate>) -> Extraction {
    debug!(candidate_count = %candidates.len(), "assemble: called");
    let mut extraction = Extraction::default();

    for candidate in candidates {
        extraction.found_any_candidate = true;

        let lowered = candidate.kind.to_lowercase();
        if ignored.iter().any(|tag| tag.to_lowercase() == lowered) {
            debug!(kind = %candidate.kind, "assemble: ignored kind");
            continue;
        }

        let result = catalog
            .resolve(&candidate.kind)
            .ok_or_else(|| ValidationError::UnknownKind(candidate.kind.clone()))
            .and_then(|kind| {
                let payload = candidate.payload.map_err(ValidationError::Malformed)?;
                Command::from_value(kind, payload)
            });

        match result {
            Ok(command) => {
                debug!(kind = %command.kind(), "assemble: accepted command");
                extraction.commands.push(command);
            }
            Err(e) => {
                debug!(kind = %candidate.kind, error = %e, "assemble: rejected candidate");
                extraction
                    .errors
                    .push(format!("[{}] Validation error: {}", candidate.kind, e));
            }
        }
    }

    extraction
}
