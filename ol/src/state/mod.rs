//! Optimisation state
//!
//! Everything the optimiser remembers across context collapses: the baseline
//! result, completed iterations, retained snapshots and the live project
//! breakdown.

pub(crate) mod breakdown;
mod history;
mod machine;
mod render;

pub use breakdown::{ActionParameter, AvailableAction, EditingGuideline, KeyFile, KnownLimitation, ProjectBreakdown};
pub use history::{IterationHistoryEntry, IterationSnapshot, PendingRollback, RollbackRecord};
pub use machine::{
    MAX_SNAPSHOTS, OptimisationState, Phase, REGRESSION_THRESHOLD, RegressionWarning, RollbackReport, StateError,
};
