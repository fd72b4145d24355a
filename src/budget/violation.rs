use std::fmt;

/// Cause of a budget violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// The surface did not signal `ready` within the boot budget.
    BootTimeout,
    /// The run outlived the run-duration budget.
    RunTimeout,
    /// The slot could not be reserved or confirmed.
    ConcurrencyLimit,
}

impl ViolationKind {
    /// Stable label; also used as the run's error message.
    pub fn as_label(&self) -> &'static str {
        match self {
            ViolationKind::BootTimeout => "boot_timeout",
            ViolationKind::RunTimeout => "run_timeout",
            ViolationKind::ConcurrencyLimit => "concurrency_limit",
        }
    }

    /// Short user-facing message.
    pub fn as_message(&self) -> &'static str {
        match self {
            ViolationKind::BootTimeout => "The capsule took too long to start and was stopped.",
            ViolationKind::RunTimeout => "The capsule reached its time limit and was stopped.",
            ViolationKind::ConcurrencyLimit => "Too many capsules are running. Stop another run first.",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A proposed violation for the session armed at `epoch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Violation {
    pub epoch: u64,
    pub kind: ViolationKind,
}
