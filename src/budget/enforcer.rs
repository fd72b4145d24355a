use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::violation::{Violation, ViolationKind};

/// Budget state machine position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetPhase {
    Idle,
    Booting,
    Running,
    Completed,
    Violated,
}

/// Timer bookkeeping for one session (`BudgetState`).
pub struct BudgetEnforcer {
    epoch: u64,
    tx: mpsc::UnboundedSender<Violation>,
    phase: BudgetPhase,
    boot_started_at: Option<Instant>,
    boot_budget: Option<Duration>,
    run_started_at: Option<Instant>,
    budget_violated: bool,
    boot_timer: Option<DropGuard>,
    run_timer: Option<DropGuard>,
}

impl BudgetEnforcer {
    /// Creates an idle enforcer whose timers report to `tx` tagged with `epoch`.
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<Violation>) -> Self {
        Self {
            epoch,
            tx,
            phase: BudgetPhase::Idle,
            boot_started_at: None,
            boot_budget: None,
            run_started_at: None,
            budget_violated: false,
            boot_timer: None,
            run_timer: None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> BudgetPhase {
        self.phase
    }

    /// One-shot latch: once set, nothing else is reported for this session.
    pub fn is_violated(&self) -> bool {
        self.budget_violated
    }

    /// Time spent booting so far (or until `ready`).
    pub fn boot_elapsed(&self) -> Option<Duration> {
        self.boot_started_at.map(|t| t.elapsed())
    }

    /// Time spent running so far.
    pub fn run_elapsed(&self) -> Option<Duration> {
        self.run_started_at.map(|t| t.elapsed())
    }

    /// Starts the boot clock and arms the `boot_timeout` timer.
    pub fn arm_boot(&mut self, budget: Duration) {
        if self.is_terminal() {
            return;
        }
        self.phase = BudgetPhase::Booting;
        self.boot_started_at = Some(Instant::now());
        self.boot_budget = Some(budget);
        self.boot_timer = Some(self.spawn_timer(budget, ViolationKind::BootTimeout));
    }

    /// Handles the surface's `ready` signal: disarms the boot timer and checks
    /// elapsed time against the budget.
    ///
    /// Returns the boot duration, or `Err(BootTimeout)` when the budget was
    /// already exceeded; the caller reports it through [`Self::report`].
    pub fn on_ready(&mut self) -> Result<Duration, ViolationKind> {
        self.boot_timer = None;
        let elapsed = self.boot_elapsed().unwrap_or_default();
        match self.boot_budget {
            Some(budget) if self.phase == BudgetPhase::Booting && elapsed > budget => {
                Err(ViolationKind::BootTimeout)
            }
            _ => Ok(elapsed),
        }
    }

    /// Starts the run clock and arms the `run_timeout` timer (`None` = no budget).
    pub fn arm_run(&mut self, budget: Option<Duration>) {
        if self.is_terminal() {
            return;
        }
        self.boot_timer = None;
        self.phase = BudgetPhase::Running;
        self.run_started_at = Some(Instant::now());
        self.run_timer = budget.map(|b| self.spawn_timer(b, ViolationKind::RunTimeout));
    }

    /// Latches a violation. Returns `true` only for the first accepted report.
    ///
    /// Timer-driven kinds are only accepted in the phase they guard, so a
    /// timer message that raced a phase change is ignored.
    pub fn report(&mut self, kind: ViolationKind) -> bool {
        if self.is_terminal() {
            return false;
        }
        let accepted = match kind {
            ViolationKind::BootTimeout => self.phase == BudgetPhase::Booting,
            ViolationKind::RunTimeout => self.phase == BudgetPhase::Running,
            ViolationKind::ConcurrencyLimit => true,
        };
        if !accepted {
            return false;
        }
        self.budget_violated = true;
        self.phase = BudgetPhase::Violated;
        self.disarm();
        true
    }

    /// Ends the session without a violation.
    pub fn complete(&mut self) {
        self.disarm();
        if !self.budget_violated {
            self.phase = BudgetPhase::Completed;
        }
    }

    /// Cancels both timers.
    pub fn disarm(&mut self) {
        self.boot_timer = None;
        self.run_timer = None;
    }

    /// True while a timer is armed.
    pub fn is_armed(&self) -> bool {
        self.boot_timer.is_some() || self.run_timer.is_some()
    }

    fn is_terminal(&self) -> bool {
        matches!(self.phase, BudgetPhase::Completed | BudgetPhase::Violated)
    }

    fn spawn_timer(&self, budget: Duration, kind: ViolationKind) -> DropGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let violation = Violation {
            epoch: self.epoch,
            kind,
        };
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(budget) => {
                    let _ = tx.send(violation);
                }
            }
        });
        token.drop_guard()
    }
}
