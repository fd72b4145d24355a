//! # LogWriter: session events as `tracing` records.
//!
//! Enabled via the `logging` feature. Failures and violations are emitted at
//! `warn`, lifecycle at `info`, delivery bookkeeping at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  capsulevisor: [session-started] run=run-123 capsule=c1 post=p1
//! WARN  capsulevisor: [budget-violated] run=run-123 reason=boot_timeout
//! INFO  capsulevisor: [session-finalized] run=run-123 status=failed duration_ms=10000 reason=boot_timeout
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let run = e.run_id.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SessionStarting | EventKind::SessionStarted => {
                tracing::info!(
                    "[{}] run={run} capsule={} post={}",
                    label(e.kind),
                    e.capsule_id.as_deref().unwrap_or("-"),
                    e.post_id.as_deref().unwrap_or("-"),
                );
            }
            EventKind::SessionFinalized => {
                tracing::info!(
                    "[session-finalized] run={run} status={} duration_ms={} reason={reason}",
                    e.status.map(|s| s.as_str()).unwrap_or("-"),
                    e.duration_ms.unwrap_or_default(),
                );
            }
            EventKind::RunAbandoned | EventKind::ToastShown | EventKind::CooldownStarted => {
                tracing::info!("[{}] run={run} reason={reason} duration_ms={:?}", label(e.kind), e.duration_ms);
            }
            EventKind::RunningChanged => {
                tracing::info!("[running-changed] running={:?}", e.running);
            }
            EventKind::StartFailed
            | EventKind::BudgetViolated
            | EventKind::TransportFailed
            | EventKind::SandboxUnreachable
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {
                tracing::warn!("[{}] run={run} reason={reason}", label(e.kind));
            }
            EventKind::SlotReserved
            | EventKind::SlotDenied
            | EventKind::SlotReleased
            | EventKind::TelemetryFlushed
            | EventKind::TelemetryDropped => {
                tracing::debug!("[{}] run={run} count={:?} reason={reason}", label(e.kind), e.count);
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::SlotReserved => "slot-reserved",
        EventKind::SlotDenied => "slot-denied",
        EventKind::SlotReleased => "slot-released",
        EventKind::CooldownStarted => "cooldown-started",
        EventKind::SessionStarting => "session-starting",
        EventKind::SessionStarted => "session-started",
        EventKind::StartFailed => "start-failed",
        EventKind::SessionFinalized => "session-finalized",
        EventKind::RunAbandoned => "run-abandoned",
        EventKind::BudgetViolated => "budget-violated",
        EventKind::RunningChanged => "running-changed",
        EventKind::SandboxUnreachable => "sandbox-unreachable",
        EventKind::TelemetryFlushed => "telemetry-flushed",
        EventKind::TelemetryDropped => "telemetry-dropped",
        EventKind::TransportFailed => "transport-failed",
        EventKind::ToastShown => "toast",
        EventKind::SubscriberPanicked => "subscriber-panicked",
        EventKind::SubscriberOverflow => "subscriber-overflow",
    }
}
