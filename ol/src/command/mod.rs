//! Command model
//!
//! A [`Command`] is a validated request extracted from generated text. The
//! set of variants is closed; each variant wraps a payload type from
//! [`types`] that declares its own fields and constraints.

mod error;
mod kind;
pub mod types;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub use error::ValidationError;
pub use kind::CommandKind;
pub use types::{
    Bash, BreakdownUpdates, DebugLog, DispatchTrajAnalysis, EditFile, EditSpec, EndIteration, Message, MultiEditFile,
    ReadFile, ResetToIteration, RunEvalSuite, SendSubagentMessage, UpdateProjectBreakdown, Validate, WriteFile,
};

/// A validated command, one variant per kind
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Read(ReadFile),
    Write(WriteFile),
    Edit(EditFile),
    MultiEdit(MultiEditFile),
    Bash(Bash),
    DebugLog(DebugLog),
    RunEvalSuite(RunEvalSuite),
    EndIteration(EndIteration),
    UpdateProjectBreakdown(UpdateProjectBreakdown),
    ResetToIteration(ResetToIteration),
    DispatchTrajAnalysis(DispatchTrajAnalysis),
    SendSubagentMessage(SendSubagentMessage),
    Finish(Message),
    Report(Message),
    Respond(Message),
}

impl Command {
    /// Build and validate a command of `kind` from a raw key-value payload
    ///
    /// A `null` payload is treated as an empty mapping so kinds whose fields
    /// all have defaults can be issued with an empty body.
    pub fn from_value(kind: CommandKind, value: Value) -> Result<Self, ValidationError> {
        debug!(%kind, "Command::from_value: called");
        let value = if value.is_null() {
            Value::Object(Default::default())
        } else {
            value
        };

        let command = match kind {
            CommandKind::Read => Self::Read(decode(value)?),
            CommandKind::Write => Self::Write(decode(value)?),
            CommandKind::Edit => Self::Edit(decode(value)?),
            CommandKind::MultiEdit => Self::MultiEdit(decode(value)?),
            CommandKind::Bash => Self::Bash(decode(value)?),
            CommandKind::DebugLog => Self::DebugLog(decode(value)?),
            CommandKind::RunEvalSuite => Self::RunEvalSuite(decode(value)?),
            CommandKind::EndIteration => Self::EndIteration(decode(value)?),
            CommandKind::UpdateProjectBreakdown => Self::UpdateProjectBreakdown(decode(value)?),
            CommandKind::ResetToIteration => Self::ResetToIteration(decode(value)?),
            CommandKind::DispatchTrajAnalysisAgent => Self::DispatchTrajAnalysis(decode(value)?),
            CommandKind::SendSubagentMessage => Self::SendSubagentMessage(decode(value)?),
            CommandKind::Finish => Self::Finish(decode(value)?),
            CommandKind::Report => Self::Report(decode(value)?),
            CommandKind::Respond => Self::Respond(decode(value)?),
        };
        Ok(command)
    }

    /// The kind of this command
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Read(_) => CommandKind::Read,
            Self::Write(_) => CommandKind::Write,
            Self::Edit(_) => CommandKind::Edit,
            Self::MultiEdit(_) => CommandKind::MultiEdit,
            Self::Bash(_) => CommandKind::Bash,
            Self::DebugLog(_) => CommandKind::DebugLog,
            Self::RunEvalSuite(_) => CommandKind::RunEvalSuite,
            Self::EndIteration(_) => CommandKind::EndIteration,
            Self::UpdateProjectBreakdown(_) => CommandKind::UpdateProjectBreakdown,
            Self::ResetToIteration(_) => CommandKind::ResetToIteration,
            Self::DispatchTrajAnalysis(_) => CommandKind::DispatchTrajAnalysisAgent,
            Self::SendSubagentMessage(_) => CommandKind::SendSubagentMessage,
            Self::Finish(_) => CommandKind::Finish,
            Self::Report(_) => CommandKind::Report,
            Self::Respond(_) => CommandKind::Respond,
        }
    }

    /// Message carried by `finish`, `report` or `respond`
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Finish(m) | Self::Report(m) | Self::Respond(m) => Some(&m.message),
            Self::DebugLog(d) => Some(&d.message),
            _ => None,
        }
    }
}

fn decode<T: DeserializeOwned + Validate>(value: Value) -> Result<T, ValidationError> {
    let payload: T = serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    payload.validate()?;
    Ok(payload)
}
