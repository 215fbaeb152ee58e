//! CommandKind - the closed set of command identifiers

use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Identifier of a command variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    Read,
    Write,
    Edit,
    MultiEdit,
    Bash,
    DebugLog,
    RunEvalSuite,
    EndIteration,
    UpdateProjectBreakdown,
    ResetToIteration,
    DispatchTrajAnalysisAgent,
    SendSubagentMessage,
    Finish,
    Report,
    Respond,
}

impl CommandKind {
    /// Every kind, in catalogue order
    pub const ALL: [CommandKind; 15] = [
        Self::Read,
        Self::Write,
        Self::Edit,
        Self::MultiEdit,
        Self::Bash,
        Self::DebugLog,
        Self::RunEvalSuite,
        Self::EndIteration,
        Self::UpdateProjectBreakdown,
        Self::ResetToIteration,
        Self::DispatchTrajAnalysisAgent,
        Self::SendSubagentMessage,
        Self::Finish,
        Self::Report,
        Self::Respond,
    ];

    /// Canonical wire name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Edit => "edit",
            Self::MultiEdit => "multi_edit",
            Self::Bash => "bash",
            Self::DebugLog => "debug_log",
            Self::RunEvalSuite => "run_eval_suite",
            Self::EndIteration => "end_iteration",
            Self::UpdateProjectBreakdown => "update_project_breakdown",
            Self::ResetToIteration => "reset_to_iteration",
            Self::DispatchTrajAnalysisAgent => "dispatch_traj_analysis_agent",
            Self::SendSubagentMessage => "send_subagent_message",
            Self::Finish => "finish",
            Self::Report => "report",
            Self::Respond => "respond",
        }
    }

    /// Look up a kind by name, case-insensitively; `-` and `_` are interchangeable
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "read" => Self::Read,
            "write" => Self::Write,
            "edit" => Self::Edit,
            "multi_edit" | "multiedit" => Self::MultiEdit,
            "bash" | "execute_shell" => Self::Bash,
            "debug_log" | "debug_note" => Self::DebugLog,
            "run_eval_suite" | "run_eval_subset" => Self::RunEvalSuite,
            "end_iteration" => Self::EndIteration,
            "update_project_breakdown" | "update_breakdown" => Self::UpdateProjectBreakdown,
            "reset_to_iteration" => Self::ResetToIteration,
            "dispatch_traj_analysis_agent" | "dispatch_analysis_helper" => Self::DispatchTrajAnalysisAgent,
            "send_subagent_message" | "message_helper" => Self::SendSubagentMessage,
            "finish" => Self::Finish,
            "report" => Self::Report,
            "respond" => Self::Respond,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds that end the current batch once executed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Report | Self::Respond)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}
