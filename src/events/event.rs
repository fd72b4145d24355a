//! # Session events emitted by player controllers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Admission events**: slot reserved / denied / released, cooldown
//! - **Session events**: start issued, started, failed, finalized, abandoned
//! - **Enforcement events**: budget violations, running-state changes
//! - **Delivery events**: telemetry flushes, transport failures, toasts
//!
//! The [`Event`] struct carries correlation metadata (run, capsule and post
//! identifiers) so the error-tracking sink can join failures to runs.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use capsulevisor::{Event, EventKind, RunStatus};
//!
//! let ev = Event::new(EventKind::SessionFinalized)
//!     .with_run("run-123")
//!     .with_status(RunStatus::Failed)
//!     .with_reason("runtime_crash");
//!
//! assert_eq!(ev.run_id.as_deref(), Some("run-123"));
//! assert_eq!(ev.status, Some(RunStatus::Failed));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::session::{RunContext, RunStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission ===
    /// A runtime slot was reserved for a loading surface.
    ///
    /// Sets: `count` (slots held after reservation)
    SlotReserved,

    /// A reservation or confirmation was refused by the cap.
    ///
    /// Sets: `count` (slots held), `reason`
    SlotDenied,

    /// A slot was released back to the registry.
    SlotReleased,

    /// A quota rejection started the local cooldown.
    ///
    /// Sets: `duration_ms` (cooldown length)
    CooldownStarted,

    // === Session ===
    /// The start-run call is being issued.
    ///
    /// Sets: `run_id` (provisional id), context ids
    SessionStarting,

    /// The backend confirmed the run.
    ///
    /// Sets: `run_id` (server id), context ids
    SessionStarted,

    /// A start attempt ended without a session.
    ///
    /// Sets: `reason` (stable label, see `SessionError::as_label`)
    StartFailed,

    /// A run reached its single terminal report.
    ///
    /// Sets: `run_id`, `status`, `duration_ms`, `reason` (error message if any)
    SessionFinalized,

    /// The page/player was torn down with a run in flight.
    ///
    /// Sets: `run_id`
    RunAbandoned,

    // === Enforcement ===
    /// A budget violation was reported for the current session.
    ///
    /// Sets: `reason` (violation label), `run_id` if a run was established
    BudgetViolated,

    /// The player's running state changed.
    ///
    /// Sets: `running`
    RunningChanged,

    /// A control signal could not be confirmed delivered to the sandbox.
    ///
    /// Sets: `reason`
    SandboxUnreachable,

    // === Delivery ===
    /// A telemetry batch was handed to the backend.
    ///
    /// Sets: `run_id`, `count`
    TelemetryFlushed,

    /// Pending telemetry was discarded.
    ///
    /// Sets: `count`, `reason`
    TelemetryDropped,

    /// A backend call failed; this is the error-tracking sink.
    ///
    /// Sets: `reason` (`"<operation>: <label>"`), run/context ids when known
    TransportFailed,

    /// A short user-facing message.
    ///
    /// Sets: `reason` (message text)
    ToastShown,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,
}

/// Session event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Run identifier (provisional or server-confirmed).
    pub run_id: Option<Arc<str>>,
    /// Capsule identifier.
    pub capsule_id: Option<Arc<str>>,
    /// Post identifier.
    pub post_id: Option<Arc<str>>,
    /// Human-readable reason (labels, error messages, toast text).
    pub reason: Option<Arc<str>>,
    /// Terminal status for `SessionFinalized`.
    pub status: Option<RunStatus>,
    /// Count (slots, log entries).
    pub count: Option<u32>,
    /// Running state for `RunningChanged`.
    pub running: Option<bool>,
    /// Duration in milliseconds (run duration, cooldown length).
    pub duration_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            run_id: None,
            capsule_id: None,
            post_id: None,
            reason: None,
            status: None,
            count: None,
            running: None,
            duration_ms: None,
        }
    }

    /// Attaches a run identifier.
    #[inline]
    pub fn with_run(mut self, run_id: impl Into<Arc<str>>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Attaches capsule and post identifiers from a run context.
    #[inline]
    pub fn with_context(mut self, ctx: &RunContext) -> Self {
        self.capsule_id = Some(Arc::from(ctx.capsule_id.as_str()));
        self.post_id = Some(Arc::from(ctx.post_id.as_str()));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a terminal run status.
    #[inline]
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a count (saturating at `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a running state.
    #[inline]
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration_ms = Some(u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Creates a toast event.
    #[inline]
    pub fn toast(message: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::ToastShown).with_reason(message)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_toast(&self) -> bool {
        matches!(self.kind, EventKind::ToastShown)
    }
}
