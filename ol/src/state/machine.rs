//! Optimisation state machine
//!
//! ```text
//! AwaitingChanges --begin_evaluation--> EvaluatingFull --complete_iteration--> CollapsedResume
//!        ^                                   |                                      |
//!        +---------abort_evaluation----------+                                      |
//!        +-------------------------------resume-------------------------------------+
//!
//! any --finish--> Finished
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{IterationHistoryEntry, IterationSnapshot, PendingRollback, ProjectBreakdown, RollbackRecord};
use crate::command::BreakdownUpdates;
use crate::eval::SuiteResult;
use crate::workspace::FileManager;

/// Snapshots retained for rollback
pub const MAX_SNAPSHOTS: usize = 5;

/// Percentage points below the best pass-rate that count as a regression
pub const REGRESSION_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingChanges,
    EvaluatingFull,
    CollapsedResume,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("No snapshot found for iteration {requested}. {}", describe_available(.available))]
    SnapshotNotFound { requested: u32, available: Vec<u32> },

    #[error("Cannot {action} in phase {phase:?}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("History entry for iteration {got} out of order, expected {expected}")]
    OutOfOrder { expected: u32, got: u32 },

    #[error("Initial evaluation result already recorded")]
    InitialResultAlreadySet,
}

fn describe_available(available: &[u32]) -> String {
    if available.is_empty() {
        "No snapshots available.".to_string()
    } else {
        format!(
            "Only the last {} snapshots are retained. Available snapshots: {:?}",
            MAX_SNAPSHOTS, available
        )
    }
}

/// Latest pass-rate fell more than [`REGRESSION_THRESHOLD`] below the best
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionWarning {
    pub baseline: f64,
    pub current: f64,
    pub best: f64,
    /// None means the baseline
    pub best_iteration: Option<u32>,
    pub regression_iteration: u32,
}

impl RegressionWarning {
    /// Snapshot holding the files behind the best result
    ///
    /// Snapshot 0 is the baseline; iteration N's files are captured as
    /// snapshot N + 1 when it completes.
    pub fn best_snapshot(&self) -> u32 {
        self.best_iteration.map_or(0, |iteration| iteration + 1)
    }
}

/// What a rollback restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub target: u32,
    pub restored: Vec<String>,
    /// `path: message` per file that could not be written
    pub errors: Vec<String>,
    pub reason: String,
}

impl RollbackReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("Reset to iteration {} state.", self.target)];
        if !self.restored.is_empty() {
            parts.push(format!(
                "Restored {} file(s): {}",
                self.restored.len(),
                self.restored.join(", ")
            ));
        }
        parts.push("Restored project breakdown state.".to_string());
        if !self.errors.is_empty() {
            parts.push(format!("Errors: {}", self.errors.join("; ")));
        }
        parts.push(format!("Reason recorded: {}", self.reason));
        write!(f, "{}", parts.join("\n"))
    }
}

/// Aggregate root of one optimisation run
#[derive(Debug, Clone)]
pub struct OptimisationState {
    iteration: u32,
    phase: Phase,
    initial_result: Option<SuiteResult>,
    history: Vec<IterationHistoryEntry>,
    snapshots: VecDeque<IterationSnapshot>,
    breakdown: ProjectBreakdown,
    pending: Option<PendingRollback>,
    rollbacks: Vec<RollbackRecord>,
}

impl OptimisationState {
    pub fn new(breakdown: ProjectBreakdown) -> Self {
        debug!("OptimisationState::new: called");
        Self {
            iteration: 0,
            phase: Phase::AwaitingChanges,
            initial_result: None,
            history: Vec::new(),
            snapshots: VecDeque::with_capacity(MAX_SNAPSHOTS + 1),
            breakdown,
            pending: None,
            rollbacks: Vec::new(),
        }
    }

    /// Iteration currently in progress
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn breakdown(&self) -> &ProjectBreakdown {
        &self.breakdown
    }

    pub fn initial_result(&self) -> Option<&SuiteResult> {
        self.initial_result.as_ref()
    }

    pub fn history(&self) -> &[IterationHistoryEntry] {
        &self.history
    }

    pub fn rollbacks(&self) -> &[RollbackRecord] {
        &self.rollbacks
    }

    pub fn set_initial_result(&mut self, result: SuiteResult) -> Result<(), StateError> {
        debug!("OptimisationState::set_initial_result: called");
        if self.initial_result.is_some() {
            return Err(StateError::InitialResultAlreadySet);
        }
        self.initial_result = Some(result);
        Ok(())
    }

    // --- snapshots ---

    /// Store a snapshot, evicting the oldest beyond [`MAX_SNAPSHOTS`]
    pub fn add_snapshot(&mut self, snapshot: IterationSnapshot) {
        debug!(iteration = %snapshot.iteration, "OptimisationState::add_snapshot: called");
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > MAX_SNAPSHOTS {
            if let Some(evicted) = self.snapshots.pop_front() {
                debug!(iteration = %evicted.iteration, "OptimisationState::add_snapshot: evicted oldest");
            }
        }
    }

    pub fn snapshot(&self, iteration: u32) -> Option<&IterationSnapshot> {
        self.snapshots.iter().find(|s| s.iteration == iteration)
    }

    /// Retained snapshot iterations in capture order
    pub fn snapshot_iterations(&self) -> Vec<u32> {
        self.snapshots.iter().map(|s| s.iteration).collect()
    }

    /// Read every tracked file and store a snapshot for `iteration`
    ///
    /// Files that cannot be read are left out of the snapshot.
    pub async fn capture_snapshot(&mut self, iteration: u32, files: &dyn FileManager) {
        debug!(%iteration, "OptimisationState::capture_snapshot: called");
        let mut contents = BTreeMap::new();
        for path in self.breakdown.tracked_files() {
            match files.content(path).await {
                Some(content) => {
                    contents.insert(path.to_string(), content);
                }
                None => warn!(%path, "Could not read file for snapshot"),
            }
        }

        info!(%iteration, file_count = %contents.len(), "Captured snapshot");
        self.add_snapshot(IterationSnapshot {
            iteration,
            files: contents,
            breakdown: self.breakdown.clone(),
            captured_at: Utc::now(),
        });
    }

    // --- rollback ---

    /// Restore tracked files and the breakdown from the snapshot of `target`
    ///
    /// Fails without touching anything when no snapshot is retained. Per-file
    /// write failures are collected in the report and do not stop the rest.
    /// The rollback is recorded as pending until the current iteration
    /// completes.
    pub async fn rollback(
        &mut self,
        target: u32,
        reason: &str,
        files: &dyn FileManager,
    ) -> Result<RollbackReport, StateError> {
        debug!(%target, "OptimisationState::rollback: called");
        let snapshot = self
            .snapshot(target)
            .cloned()
            .ok_or_else(|| StateError::SnapshotNotFound {
                requested: target,
                available: self.snapshot_iterations(),
            })?;

        let mut restored = Vec::new();
        let mut errors = Vec::new();
        for (path, content) in &snapshot.files {
            let outcome = files.write(path, content).await;
            if outcome.is_error {
                errors.push(format!("{}: {}", path, outcome.content));
            } else {
                restored.push(path.clone());
            }
        }

        self.breakdown.restore_from(&snapshot.breakdown);
        self.pending = Some(PendingRollback {
            from_iteration: target,
            reason: reason.to_string(),
        });
        self.rollbacks.push(RollbackRecord {
            target,
            reason: reason.to_string(),
            during_iteration: self.iteration,
        });

        info!(
            %target,
            restored = %restored.len(),
            errors = %errors.len(),
            "Rolled back to snapshot"
        );
        Ok(RollbackReport {
            target,
            restored,
            errors,
            reason: reason.to_string(),
        })
    }

    pub fn pending_rollback(&self) -> Option<&PendingRollback> {
        self.pending.as_ref()
    }

    pub fn take_pending_rollback(&mut self) -> Option<PendingRollback> {
        self.pending.take()
    }

    // --- breakdown ---

    /// Apply structured updates, returning one `kind: name` line per change
    pub fn apply_updates(&mut self, updates: &BreakdownUpdates) -> Vec<String> {
        debug!("OptimisationState::apply_updates: called");
        let mut applied = Vec::new();

        for (path, description) in updates.files.iter().flatten() {
            info!(%path, "Updating file in project breakdown");
            self.breakdown.update_file(path, description);
            applied.push(format!("file: {}", path));
        }
        for (name, description) in updates.actions.iter().flatten() {
            info!(%name, "Updating action in project breakdown");
            self.breakdown.update_action(name, description);
            applied.push(format!("action: {}", name));
        }
        for (eval_name, reason) in updates.known_limitations.iter().flatten() {
            info!(%eval_name, "Marking eval as known limitation");
            self.breakdown.add_known_limitation(eval_name, reason);
            applied.push(format!("known_limitation: {}", eval_name));
        }

        applied
    }

    // --- regression ---

    /// Compare the latest entry with the best pass-rate so far
    pub fn regression(&self) -> Option<RegressionWarning> {
        let latest = self.history.last()?;
        let baseline = self.initial_result.as_ref()?.accuracy();
        let current = latest.accuracy();

        let mut best = baseline;
        let mut best_iteration = None;
        for entry in &self.history {
            let accuracy = entry.accuracy();
            if accuracy > best {
                best = accuracy;
                best_iteration = Some(entry.iteration);
            }
        }

        (current < best - REGRESSION_THRESHOLD).then_some(RegressionWarning {
            baseline,
            current,
            best,
            best_iteration,
            regression_iteration: latest.iteration,
        })
    }

    // --- phase transitions ---

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), StateError> {
        if self.phase != expected {
            return Err(StateError::InvalidTransition {
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }

    /// The full suite is about to run for the current iteration
    pub fn begin_evaluation(&mut self) -> Result<(), StateError> {
        self.expect_phase(Phase::AwaitingChanges, "begin evaluation")?;
        self.phase = Phase::EvaluatingFull;
        Ok(())
    }

    /// The suite failed; the iteration carries on unchanged
    pub fn abort_evaluation(&mut self) -> Result<(), StateError> {
        self.expect_phase(Phase::EvaluatingFull, "abort evaluation")?;
        self.phase = Phase::AwaitingChanges;
        Ok(())
    }

    /// Append the entry of the current iteration
    pub fn complete_iteration(&mut self, entry: IterationHistoryEntry) -> Result<(), StateError> {
        self.expect_phase(Phase::EvaluatingFull, "complete iteration")?;
        if entry.iteration != self.iteration {
            return Err(StateError::OutOfOrder {
                expected: self.iteration,
                got: entry.iteration,
            });
        }
        info!(iteration = %entry.iteration, accuracy = %format!("{:.1}", entry.accuracy()), "Iteration completed");
        self.history.push(entry);
        self.phase = Phase::CollapsedResume;
        Ok(())
    }

    /// Start the next iteration after the context collapsed
    pub fn resume(&mut self) -> Result<u32, StateError> {
        self.expect_phase(Phase::CollapsedResume, "resume")?;
        self.iteration += 1;
        self.phase = Phase::AwaitingChanges;
        Ok(self.iteration)
    }

    pub fn finish(&mut self) {
        debug!(phase = ?self.phase, "OptimisationState::finish: called");
        self.phase = Phase::Finished;
    }
}
