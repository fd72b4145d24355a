use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::backend::{AppendLogsRequest, RunBackend};
use crate::config::SessionConfig;
use crate::events::{Bus, Event, EventKind};
use crate::session::RunContext;

use super::entry::LogEntry;

/// What a flush is attributed to: the current run and its capsule/post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelemetryScope {
    pub run_id: Option<String>,
    pub context: Option<RunContext>,
}

struct BatchState {
    pending: Vec<LogEntry>,
    scope: TelemetryScope,
    /// Deferred flush; dropping the guard cancels it.
    timer: Option<DropGuard>,
    /// Incremented on every arm so a late timer cannot flush a newer batch.
    timer_gen: u64,
}

struct BatcherInner {
    backend: Arc<dyn RunBackend>,
    bus: Bus,
    sample_rate: f64,
    target: usize,
    interval: Duration,
    rng: Mutex<StdRng>,
    state: Mutex<BatchState>,
}

/// Sampling, size/time-triggered log batcher for one player.
///
/// ### Rules
/// - `error` entries are always kept; others with probability `log_sample_rate`.
/// - An entry is either flushed or dropped, never both, never twice.
/// - Flushing never awaits the network; submission is spawned.
#[derive(Clone)]
pub struct TelemetryBatcher {
    inner: Arc<BatcherInner>,
}

impl TelemetryBatcher {
    /// Creates a batcher using the sampling/batching knobs of `cfg`.
    pub fn new(cfg: &SessionConfig, backend: Arc<dyn RunBackend>, bus: Bus) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                backend,
                bus,
                sample_rate: cfg.log_sample_rate_clamped(),
                target: cfg.batch_target_clamped(),
                interval: cfg.log_batch_interval,
                rng: Mutex::new(StdRng::from_os_rng()),
                state: Mutex::new(BatchState {
                    pending: Vec::new(),
                    scope: TelemetryScope::default(),
                    timer: None,
                    timer_gen: 0,
                }),
            }),
        }
    }

    /// Replaces the sampling RNG with a seeded one (reproducible sampling).
    pub fn reseed(&self, seed: u64) {
        *self.inner.rng.lock() = StdRng::seed_from_u64(seed);
    }

    /// Samples and queues an entry. Returns `true` if the entry was kept.
    pub fn enqueue(&self, mut entry: LogEntry) -> bool {
        let rate = if entry.is_error() {
            1.0
        } else {
            self.inner.sample_rate
        };
        if rate < 1.0 && !self.inner.rng.lock().random_bool(rate) {
            return false;
        }
        entry.sample_rate = rate;
        self.push(entry);
        true
    }

    /// Queues an entry that was already sampled upstream (keeps its `sample_rate`).
    pub fn enqueue_sampled(&self, entry: LogEntry) {
        self.push(entry);
    }

    /// Flushes pending entries, attributing them to `explicit_run_id` or the
    /// scope's run. Returns the number of entries handed to the backend.
    pub fn flush(&self, explicit_run_id: Option<&str>) -> usize {
        let batch = {
            let mut state = self.inner.state.lock();
            state.timer = None;
            if state.pending.is_empty() {
                return 0;
            }
            let logs = std::mem::take(&mut state.pending);
            let run_id = explicit_run_id
                .map(str::to_string)
                .or_else(|| state.scope.run_id.clone());
            (logs, run_id, state.scope.context.clone())
        };

        match batch {
            (logs, Some(run_id), Some(ctx)) if ctx.is_resolvable() => self.submit(run_id, ctx, logs),
            (logs, run_id, _) => {
                let reason = if run_id.is_none() {
                    "no_run_id"
                } else {
                    "no_context"
                };
                tracing::debug!(count = logs.len(), reason, "telemetry discarded");
                self.inner.bus.publish(
                    Event::new(EventKind::TelemetryDropped)
                        .with_count(logs.len())
                        .with_reason(reason),
                );
                0
            }
        }
    }

    /// Drops pending entries without submitting them.
    pub fn discard(&self, reason: &'static str) -> usize {
        let dropped = {
            let mut state = self.inner.state.lock();
            state.timer = None;
            std::mem::take(&mut state.pending).len()
        };
        if dropped > 0 {
            self.inner.bus.publish(
                Event::new(EventKind::TelemetryDropped)
                    .with_count(dropped)
                    .with_reason(reason),
            );
        }
        dropped
    }

    /// Binds (or clears) the run subsequent flushes are attributed to.
    pub fn bind_run(&self, run_id: Option<String>) {
        self.inner.state.lock().scope.run_id = run_id;
    }

    /// Binds (or clears) the capsule/post context.
    pub fn bind_context(&self, context: Option<RunContext>) {
        self.inner.state.lock().scope.context = context;
    }

    /// Current attribution.
    pub fn scope(&self) -> TelemetryScope {
        self.inner.state.lock().scope.clone()
    }

    /// Entries waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    fn push(&self, entry: LogEntry) {
        let full = {
            let mut state = self.inner.state.lock();
            state.pending.push(entry);
            if state.pending.len() >= self.inner.target {
                true
            } else {
                if state.timer.is_none() {
                    self.arm_timer(&mut state);
                }
                false
            }
        };
        if full {
            self.flush(None);
        }
    }

    fn arm_timer(&self, state: &mut BatchState) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        state.timer_gen = state.timer_gen.wrapping_add(1);
        let generation = state.timer_gen;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak: Weak<BatcherInner> = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;

        handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    if let Some(inner) = weak.upgrade() {
                        let batcher = TelemetryBatcher { inner };
                        if batcher.inner.state.lock().timer_gen == generation {
                            batcher.flush(None);
                        }
                    }
                }
            }
        });
        state.timer = Some(token.drop_guard());
    }

    fn submit(&self, run_id: String, ctx: RunContext, logs: Vec<LogEntry>) -> usize {
        let count = logs.len();
        let req = AppendLogsRequest {
            capsule_id: ctx.capsule_id.clone(),
            post_id: ctx.post_id.clone(),
            artifact_id: ctx.artifact_id.clone(),
            logs,
        };
        self.inner.bus.publish(
            Event::new(EventKind::TelemetryFlushed)
                .with_run(run_id.as_str())
                .with_context(&ctx)
                .with_count(count),
        );

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(run_id = %run_id, count, "no runtime to submit telemetry; batch lost");
            return 0;
        };
        let backend = Arc::clone(&self.inner.backend);
        let bus = self.inner.bus.clone();
        handle.spawn(async move {
            if let Err(e) = backend.append_logs(&run_id, &req).await {
                tracing::warn!(
                    run_id = %run_id,
                    capsule_id = %ctx.capsule_id,
                    post_id = %ctx.post_id,
                    error = %e,
                    "append_logs failed"
                );
                bus.publish(
                    Event::new(EventKind::TransportFailed)
                        .with_run(run_id.as_str())
                        .with_context(&ctx)
                        .with_reason(format!("append_logs: {}", e.as_label())),
                );
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompleteRunRequest, StartRunRequest, StartRunResponse};
    use crate::error::BackendError;
    use crate::telemetry::LogLevel;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Sink {
        batches: Mutex<Vec<(String, AppendLogsRequest)>>,
    }

    #[async_trait]
    impl RunBackend for Sink {
        async fn start_run(&self, _: &StartRunRequest) -> Result<StartRunResponse, BackendError> {
            Ok(StartRunResponse::default())
        }
        async fn complete_run(&self, _: &CompleteRunRequest) -> Result<(), BackendError> {
            Ok(())
        }
        async fn append_logs(&self, run_id: &str, req: &AppendLogsRequest) -> Result<(), BackendError> {
            self.batches.lock().push((run_id.to_string(), req.clone()));
            Ok(())
        }
    }

    fn batcher(sample_rate: f64) -> (TelemetryBatcher, Arc<Sink>) {
        let cfg = SessionConfig {
            log_sample_rate: sample_rate,
            ..SessionConfig::default()
        };
        let sink = Arc::new(Sink::default());
        let b = TelemetryBatcher::new(&cfg, sink.clone(), Bus::new(64));
        b.bind_context(Some(RunContext::new("capsule-1", "post-1")));
        b.bind_run(Some("run-1".into()));
        (b, sink)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_flushes_without_waiting() {
        let (b, sink) = batcher(1.0);
        for i in 0..10 {
            assert!(b.enqueue(LogEntry::new(LogLevel::Info, format!("line {i}"), "console")));
        }
        assert_eq!(b.pending_len(), 0);
        settle().await;

        let batches = sink.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, "run-1");
        assert_eq!(batches[0].1.logs.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_batch_flushes_after_interval() {
        let (b, sink) = batcher(1.0);
        b.enqueue(LogEntry::new(LogLevel::Info, "a", "console"));
        b.enqueue(LogEntry::new(LogLevel::Info, "b", "console"));

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert!(sink.batches.lock().is_empty());
        assert_eq!(b.pending_len(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(sink.batches.lock().len(), 1);
        assert_eq!(b.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn error_entries_bypass_sampling() {
        let (b, _sink) = batcher(0.0);
        assert!(!b.enqueue(LogEntry::new(LogLevel::Info, "dropped", "console")));
        assert!(b.enqueue(LogEntry::new(LogLevel::Error, "kept", "console")));
        assert_eq!(b.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nan_rate_keeps_only_errors() {
        let (b, _sink) = batcher(f64::NAN);
        assert!(!b.enqueue(LogEntry::new(LogLevel::Warn, "dropped", "console")));
        assert!(b.enqueue(LogEntry::new(LogLevel::Error, "kept", "console")));
        assert_eq!(b.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn info_sampling_is_roughly_the_rate() {
        let cfg = SessionConfig {
            log_batch_target: 10_000,
            ..SessionConfig::default()
        };
        let b = TelemetryBatcher::new(&cfg, Arc::new(Sink::default()), Bus::new(8));
        let kept = (0..1000)
            .filter(|i| b.enqueue(LogEntry::new(LogLevel::Info, format!("{i}"), "console")))
            .count();
        assert!((130..=270).contains(&kept), "kept {kept} of 1000 at 0.2");
        assert_eq!(b.pending_len(), kept);
    }

    #[tokio::test(start_paused = true)]
    async fn kept_entries_carry_their_sample_rate() {
        let (b, sink) = batcher(1.0);
        b.reseed(7);
        b.enqueue(LogEntry::new(LogLevel::Error, "boom", "runtime"));
        assert_eq!(b.flush(None), 1);
        settle().await;
        assert_eq!(sink.batches.lock()[0].1.logs[0].sample_rate, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_scope_discards_queue() {
        let (b, sink) = batcher(1.0);
        b.bind_run(None);
        b.enqueue(LogEntry::new(LogLevel::Info, "orphan", "console"));

        assert_eq!(b.flush(None), 0);
        assert_eq!(b.pending_len(), 0);

        b.enqueue(LogEntry::new(LogLevel::Info, "explicit", "console"));
        assert_eq!(b.flush(Some("run-9")), 1);
        settle().await;
        assert_eq!(sink.batches.lock()[0].0, "run-9");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_cancels_pending_timer() {
        let (b, sink) = batcher(1.0);
        b.enqueue(LogEntry::new(LogLevel::Info, "a", "console"));
        assert_eq!(b.flush(None), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.batches.lock().len(), 1);
    }
}
