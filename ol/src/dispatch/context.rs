//! ExecutionContext - per-turn record of what a batch did

use tracing::debug;

use crate::command::CommandKind;

/// Produced by a successful end-iteration; tells the loop to collapse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationCompleted {
    pub iteration: u32,
    pub accuracy: f64,
}

/// Created fresh for every turn of the driving loop
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,

    /// Iteration in progress when the turn started
    pub iteration: u32,

    /// Every kind extracted for this turn, in extraction order
    batch: Vec<CommandKind>,

    /// Kinds executed so far, append-only
    executed: Vec<CommandKind>,

    terminate: bool,

    completed: Option<IterationCompleted>,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, iteration: u32) -> Self {
        let run_id = run_id.into();
        debug!(%run_id, %iteration, "ExecutionContext::new: called");
        Self {
            run_id,
            iteration,
            batch: Vec::new(),
            executed: Vec::new(),
            terminate: false,
            completed: None,
        }
    }

    /// Announce the commands of the turn before any of them runs
    pub fn set_batch(&mut self, kinds: impl IntoIterator<Item = CommandKind>) {
        self.batch = kinds.into_iter().collect();
    }

    pub fn batch(&self) -> &[CommandKind] {
        &self.batch
    }

    pub fn record(&mut self, kind: CommandKind) {
        debug!(%kind, "ExecutionContext::record: called");
        self.executed.push(kind);
    }

    pub fn executed(&self) -> &[CommandKind] {
        &self.executed
    }

    /// Kinds in the batch, other than debug notes and one instance of `kind`
    pub fn batch_companions(&self, kind: CommandKind) -> Vec<CommandKind> {
        let mut own_seen = false;
        self.batch
            .iter()
            .copied()
            .filter(|k| *k != CommandKind::DebugLog)
            .filter(|k| {
                if *k == kind && !own_seen {
                    own_seen = true;
                    return false;
                }
                true
            })
            .collect()
    }

    /// Stop after the current command; cannot be undone
    pub fn request_terminate(&mut self) {
        debug!("ExecutionContext::request_terminate: called");
        self.terminate = true;
    }

    pub fn should_terminate(&self) -> bool {
        self.terminate
    }

    pub fn mark_completed(&mut self, completed: IterationCompleted) {
        debug!(iteration = %completed.iteration, "ExecutionContext::mark_completed: called");
        self.completed = Some(completed);
    }

    pub fn completed(&self) -> Option<IterationCompleted> {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_clean() {
        let ctx = ExecutionContext::new("run-1", 3);
        assert_eq!(ctx.run_id, "run-1");
        assert_eq!(ctx.iteration, 3);
        assert!(ctx.executed().is_empty());
        assert!(!ctx.should_terminate());
        assert!(ctx.completed().is_none());
    }

    #[test]
    fn test_record_keeps_order() {
        let mut ctx = ExecutionContext::new("run-1", 0);
        ctx.record(CommandKind::Read);
        ctx.record(CommandKind::Edit);
        ctx.record(CommandKind::Read);
        assert_eq!(ctx.executed(), &[CommandKind::Read, CommandKind::Edit, CommandKind::Read]);
    }

    #[test]
    fn test_terminate_is_monotonic() {
        let mut ctx = ExecutionContext::new("run-1", 0);
        ctx.request_terminate();
        ctx.request_terminate();
        assert!(ctx.should_terminate());
    }

    #[test]
    fn test_batch_companions_ignore_debug_and_self() {
        let mut ctx = ExecutionContext::new("run-1", 0);
        ctx.set_batch([CommandKind::DebugLog, CommandKind::EndIteration, CommandKind::DebugLog]);
        assert!(ctx.batch_companions(CommandKind::EndIteration).is_empty());

        ctx.set_batch([CommandKind::Edit, CommandKind::EndIteration]);
        assert_eq!(ctx.batch_companions(CommandKind::EndIteration), vec![CommandKind::Edit]);

        ctx.set_batch([CommandKind::EndIteration, CommandKind::EndIteration]);
        assert_eq!(ctx.batch_companions(CommandKind::EndIteration), vec![CommandKind::EndIteration]);
    }
}
