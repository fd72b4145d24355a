//! # Sampled run telemetry.
//!
//! ```text
//! sandbox log ──► TelemetryBatcher::enqueue ──► sample (error = always, else LOG_SAMPLE_RATE)
//!                                                 │ kept
//!                                                 ▼
//!                                        pending queue ──► len == target ──► flush now
//!                                                 │
//!                                                 └─► first entry arms timer ──► flush on expiry
//!
//! flush(run?) ──► resolve run id + capsule/post ──► spawn append_logs (fire-and-forget)
//!                       └─ unresolvable ──► queue discarded (TelemetryDropped)
//!
//! sandbox stats / bootMetrics ──► PerfThrottle::admit ──► enqueue_sampled(source = "perf")
//! ```
//!
//! ## Delivery
//! At-most-once: a failed `append_logs` is reported to the error-tracking sink
//! (`EventKind::TransportFailed`) and never re-queued.

mod batcher;
mod entry;
mod perf;

pub use batcher::{TelemetryBatcher, TelemetryScope};
pub use entry::{LogEntry, LogLevel};
pub use perf::PerfThrottle;
