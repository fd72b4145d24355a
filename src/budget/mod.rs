//! # Per-session boot and run budgets.
//!
//! ```text
//!            arm_boot(budget)            on_ready() ok          complete()
//!   Idle ───────────────────► Booting ─────────────► Running ─────────────► Completed
//!                                │    arm_run(budget)   │
//!                                │                      │
//!            boot timer fires ───┤                      ├─── run timer fires
//!            on_ready() late  ───┤                      │
//!            slot denied      ───┴──────► Violated ◄────┴─── slot denied
//! ```
//!
//! ## Rules
//! - Timers are spawned tasks owned through `DropGuard`s: disarming, reporting,
//!   completing and dropping the enforcer all cancel them.
//! - A fired timer only **proposes** a violation (over the channel); the owner
//!   decides through [`BudgetEnforcer::report`], which is a one-shot latch.
//! - `on_ready` compares wall-clock elapsed time with the budget, so a timer
//!   that fires late still yields a `boot_timeout`.

mod enforcer;
mod violation;

pub use enforcer::{BudgetEnforcer, BudgetPhase};
pub use violation::{Violation, ViolationKind};
