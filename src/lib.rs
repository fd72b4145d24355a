//! # capsulevisor
//!
//! **Capsulevisor** is the runtime session manager for sandboxed capsule players.
//!
//! It decides how many capsule executions may run at once, how long each may
//! take to boot and run, reports each run's outcome to the accounting backend
//! exactly once, and batches sampled telemetry about the run.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   sandbox    │   │   sandbox    │   │   sandbox    │
//!     │  (player #1) │   │  (player #2) │   │  (player #3) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ SandboxSignal    │                  │
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Session     │   │  Session     │   │  Session     │
//!     │  Controller  │   │  Controller  │   │  Controller  │
//!     │ ├ Budget     │   │ ├ Budget     │   │ ├ Budget     │
//!     │ ├ Telemetry  │   │ ├ Telemetry  │   │ ├ Telemetry  │
//!     │ └ Ledger     │   │ └ Ledger     │   │ └ Ledger     │
//!     └──┬───────┬───┘   └──┬───────┬───┘   └──┬───────┬───┘
//!        │       │          │       │          │       │
//!        ▼       │          ▼       │          ▼       │
//! ┌──────────────┴──────────────────┴──────────────────┴──────────────┐
//! │ shared per process: AdmissionRegistry · RateLimitGuard · Bus       │
//! └───────────────────────────────┬───────────────────────────────────┘
//!                                 ▼
//!              RunBackend (start_run / complete_run / append_logs)
//!              Beacon     (teardown report, e.g. SpoolBeacon)
//! ```
//!
//! ### Session lifecycle
//! ```text
//! loading ─► reserve slot ─► arm boot budget
//! ready   ─► check boot elapsed ─► start_run ─► confirm slot ─► arm run budget
//! error / kill / restart / violation ─► finalize once ─► complete_run
//! teardown ─► abandon ─► Beacon::send_complete
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types                                 |
//! |-------------------|-----------------------------------------------------------|-------------------------------------------|
//! | **Players**       | Session lifecycle, exactly-once terminal reports.         | [`SessionController`], [`Session`]        |
//! | **Admission**     | Process-wide cap on concurrent runs.                      | [`AdmissionRegistry`], [`SlotToken`]      |
//! | **Rate limiting** | Local start suppression after a quota rejection.          | [`RateLimitGuard`]                        |
//! | **Budgets**       | Boot and run deadlines, one violation per session.        | [`BudgetEnforcer`], [`ViolationKind`]     |
//! | **Telemetry**     | Sampled, batched logs and throttled perf samples.         | [`TelemetryBatcher`], [`PerfThrottle`]    |
//! | **Transport**     | Backend and beacon seams.                                 | [`RunBackend`], [`Beacon`], [`SpoolBeacon`] |
//! | **Events**        | Observable effects (toasts, running state, failures).     | [`Bus`], [`Event`], [`Subscribe`]         |
//! | **Configuration** | Budgets, caps, rates; `CAPSULE_*` env overlay.            | [`SessionConfig`]                         |
//!
//! ## Optional features
//! - `http` _(default)_: [`HttpBackend`] over `reqwest`.
//! - `logging`: exports [`LogWriter`], which renders events as `tracing` records.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use capsulevisor::{
//!     AdmissionRegistry, RateLimitGuard, RunContext, SandboxSignal, SessionConfig,
//!     SessionController, SpoolBeacon,
//! };
//! # use capsulevisor::{RunBackend, SandboxControl};
//! # fn backend() -> Arc<dyn RunBackend> { unimplemented!() }
//! # fn sandbox() -> Arc<dyn SandboxControl> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), capsulevisor::ConfigError> {
//!     let cfg = SessionConfig::from_env()?;
//!     let registry = Arc::new(AdmissionRegistry::new(cfg.max_runners_clamped()));
//!     let guard = Arc::new(RateLimitGuard::new());
//!     let spool = Arc::new(SpoolBeacon::new("/var/tmp/capsules/completions.jsonl"));
//!
//!     let player = SessionController::builder(cfg, backend(), spool.clone(), sandbox())
//!         .with_spool(spool)
//!         .with_registry(registry)
//!         .with_guard(guard)
//!         .with_context(RunContext::new("capsule-1", "post-1"))
//!         .build();
//!
//!     player.on_signal(SandboxSignal::Loading).await;
//!     player.on_signal(SandboxSignal::Ready).await;
//!     assert!(player.is_running());
//!     player.restart().await;
//!     Ok(())
//! }
//! ```

mod admission;
mod backend;
mod budget;
mod config;
mod cooldown;
mod error;
mod events;
mod sandbox;
mod session;
mod subscribers;
mod telemetry;

pub use admission::{Admission, AdmissionRegistry, SlotToken};
#[cfg(feature = "http")]
pub use backend::HttpBackend;
pub use backend::{
    AppendLogsRequest, Beacon, CompleteRunRequest, DrainReport, QuotaLimits, QuotaReason,
    QuotaRejection, RunBackend, SpoolBeacon, StartRunRequest, StartRunResponse, StaticToken,
    TokenSource,
};
pub use budget::{BudgetEnforcer, BudgetPhase, Violation, ViolationKind};
pub use config::{ConfigError, SessionConfig};
pub use cooldown::RateLimitGuard;
pub use error::{BackendError, SessionError};
pub use events::{Bus, Event, EventKind};
pub use sandbox::{SandboxControl, SandboxError, SandboxSignal};
pub use session::{
    FinalizeOutcome, FinalizedRuns, RunContext, RunStatus, RunnerKind, Session,
    SessionController, SessionControllerBuilder,
};
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
pub use subscribers::{Subscribe, SubscriberSet};
pub use telemetry::{LogEntry, LogLevel, PerfThrottle, TelemetryBatcher, TelemetryScope};
