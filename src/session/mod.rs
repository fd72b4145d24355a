//! # Session lifecycle.
//!
//! A [`SessionController`] is one player: it owns at most one active
//! [`Session`], reports each run's terminal outcome exactly once, and keeps the
//! admission slot, budgets and telemetry in step with the sandbox.
//!
//! ## Flow
//! ```text
//! Loading ──► new epoch ──► AdmissionRegistry::reserve ──► BudgetEnforcer::arm_boot
//!                                │ denied
//!                                └──► concurrency_limit violation
//! Ready ────► on_ready (elapsed vs budget) ──► start_session()
//!                                                │  context? cooldown? slot?
//!                                                ▼
//!                                      RunBackend::start_run
//!                                 ┌──────────────┼──────────────────┐
//!                                429            2xx               other / transport
//!                        cooldown + toast   confirm slot           release + toast
//!                        release slot       arm_run, running
//!
//! Error / kill / restart / violation ──► finalize_session(status, msg)
//!                                           │ FinalizedRuns::record == First?
//!                                           ▼
//!                 flush telemetry ─► disarm budget ─► release slot ─► complete_run
//! Drop / abandon() ────────────────► Beacon::send_complete (synchronous)
//! ```
//!
//! ## Rules
//! - Only one `start_run` per player is in flight; concurrent callers share it.
//! - `failed` is never downgraded to `completed`; a repeat is a no-op.
//! - Violations carry the epoch they were armed for; a stale one is ignored.
//! - Kill/restart always update the running state, even if the sandbox is gone.

mod builder;
mod controller;
mod ledger;
mod types;

pub use builder::SessionControllerBuilder;
pub use controller::SessionController;
pub use ledger::{FinalizeOutcome, FinalizedRuns};
pub use types::{RunContext, RunStatus, RunnerKind, Session};

pub(crate) use types::epoch_millis;
