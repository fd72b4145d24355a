//! # Backend interfaces consumed by players.
//!
//! The run-accounting service owns the wire format; this module owns the
//! seams the session runtime talks through.
//!
//! ```text
//! SessionController ──► RunBackend::start_run / complete_run
//! TelemetryBatcher  ──► RunBackend::append_logs
//! abandon()         ──► Beacon::send_complete   (synchronous, survives teardown)
//! first start       ──► SpoolBeacon::drain(&RunBackend)   (builder `with_spool`)
//! ```
//!
//! - [`RunBackend`]: async request/response contract (fakes in tests, [`HttpBackend`] in production).
//! - [`Beacon`]: fire-and-forget terminal report usable while the player is being destroyed.
//! - [`TokenSource`]: credentials; a missing token short-circuits every call with
//!   [`BackendError::MissingAuth`](crate::BackendError::MissingAuth).

#[cfg(feature = "http")]
mod http;
mod spool;
mod traits;
mod types;

#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use spool::{DrainReport, SpoolBeacon};
pub use traits::{Beacon, RunBackend, StaticToken, TokenSource};
pub use types::{
    AppendLogsRequest, CompleteRunRequest, QuotaLimits, QuotaReason, QuotaRejection,
    StartRunRequest, StartRunResponse,
};
