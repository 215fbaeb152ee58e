//! Command validation errors

use thiserror::Error;

/// Why a raw payload could not become a [`Command`](super::Command)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown command kind: {0}")]
    UnknownKind(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}
