//! # Finalized-run ledger.
//!
//! Guards the single terminal report per run.
//!
//! ## Rules
//! - The first `record` for a run id wins and is the only one that reports.
//! - `failed` is sticky: a later `completed` never overwrites it.
//! - A later `failed` after `completed` updates the local record but does not
//!   report again (the backend already has its one terminal report).

use std::collections::{HashMap, VecDeque};

use super::types::RunStatus;

/// Bound on remembered runs per player.
const LEDGER_CAPACITY: usize = 512;

/// Result of [`FinalizedRuns::record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// First terminal status for this run: report it.
    First,
    /// Same status again: no-op.
    Repeat,
    /// `completed` after `failed`: refused.
    Refused,
    /// `failed` after `completed`: recorded locally, not reported.
    Upgraded,
}

impl FinalizeOutcome {
    /// Only the first record triggers a report.
    pub fn should_report(self) -> bool {
        matches!(self, FinalizeOutcome::First)
    }
}

/// Terminal statuses of recent runs (`FinalizedRunRecord` set).
#[derive(Debug, Default)]
pub struct FinalizedRuns {
    status: HashMap<String, RunStatus>,
    order: VecDeque<String>,
}

impl FinalizedRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a terminal status for `run_id`.
    pub fn record(&mut self, run_id: &str, status: RunStatus) -> FinalizeOutcome {
        match self.status.get_mut(run_id) {
            None => {
                self.insert(run_id, status);
                FinalizeOutcome::First
            }
            Some(prev) if *prev == status => FinalizeOutcome::Repeat,
            Some(RunStatus::Failed) => FinalizeOutcome::Refused,
            Some(prev) => {
                *prev = RunStatus::Failed;
                FinalizeOutcome::Upgraded
            }
        }
    }

    /// Terminal status recorded for `run_id`, if any.
    pub fn get(&self, run_id: &str) -> Option<RunStatus> {
        self.status.get(run_id).copied()
    }

    pub fn len(&self) -> usize {
        self.status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    fn insert(&mut self, run_id: &str, status: RunStatus) {
        if self.order.len() >= LEDGER_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.status.remove(&oldest);
            }
        }
        self.order.push_back(run_id.to_string());
        self.status.insert(run_id.to_string(), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_is_never_downgraded() {
        let mut runs = FinalizedRuns::new();
        assert_eq!(runs.record("r", RunStatus::Failed), FinalizeOutcome::First);
        assert_eq!(runs.record("r", RunStatus::Failed), FinalizeOutcome::Repeat);
        assert_eq!(runs.record("r", RunStatus::Completed), FinalizeOutcome::Refused);
        assert_eq!(runs.get("r"), Some(RunStatus::Failed));
    }

    #[test]
    fn completed_can_be_marked_failed_without_reporting() {
        let mut runs = FinalizedRuns::new();
        assert!(runs.record("r", RunStatus::Completed).should_report());
        let outcome = runs.record("r", RunStatus::Failed);
        assert_eq!(outcome, FinalizeOutcome::Upgraded);
        assert!(!outcome.should_report());
        assert_eq!(runs.get("r"), Some(RunStatus::Failed));
    }

    #[test]
    fn oldest_runs_are_evicted_past_capacity() {
        let mut runs = FinalizedRuns::new();
        for i in 0..=LEDGER_CAPACITY {
            runs.record(&format!("run-{i}"), RunStatus::Completed);
        }
        assert_eq!(runs.len(), LEDGER_CAPACITY);
        assert_eq!(runs.get("run-0"), None);
        assert!(runs.get(&format!("run-{LEDGER_CAPACITY}")).is_some());
    }
}
