//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! Bus ──► listen() ──► emit(event)
//!                          │
//!                          ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!                          │    (bounded)         └──────► panic → SubscriberPanicked
//!                          └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` returns immediately (`try_send`).
//! - **Overflow**: the event is dropped for that subscriber only and
//!   `SubscriberOverflow` is published (never for an overflow event itself).
//! - **Isolation**: a panicking subscriber is reported and keeps running.
//! - **Per-subscriber FIFO**; no ordering across subscribers.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

struct Fanout {
    channels: Vec<SubscriberChannel>,
    bus: Bus,
}

impl Fanout {
    fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }
}

/// Fan-out coordinator for event subscribers.
pub struct SubscriberSet {
    fanout: Arc<Fanout>,
    workers: Vec<JoinHandle<()>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    stop: CancellationToken,
    _stop_on_drop: DropGuard,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    ///
    /// Queue capacity comes from [`Subscribe::queue_capacity`] (min 1).
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let worker_bus = bus.clone();

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let any = &*panic_err;
                        let info = if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        worker_bus.publish(Event::subscriber_panicked(sub.name(), info));
                    }
                }
            }));
            channels.push(SubscriberChannel { name, sender: tx });
        }

        let stop = CancellationToken::new();
        Self {
            fanout: Arc::new(Fanout { channels, bus }),
            workers,
            listener: Mutex::new(None),
            _stop_on_drop: stop.clone().drop_guard(),
            stop,
        }
    }

    /// Emits an event to all subscribers (clones it once).
    pub fn emit(&self, event: &Event) {
        self.fanout.emit_arc(Arc::new(event.clone()));
    }

    /// Forwards every event received on `rx` until the set is shut down or
    /// dropped. Replaces a previous listener.
    pub fn listen(&self, mut rx: broadcast::Receiver<Event>) {
        let fanout = Arc::clone(&self.fanout);
        let stop = self.stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => fanout.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged");
                        }
                    }
                }
            }
        });
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stops the listener, closes every queue and waits for workers to drain.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let listener = self.listener.lock().take();
        if let Some(h) = listener {
            let _ = h.await;
        }
        drop(self.fanout);
        for h in self.workers {
            let _ = h.await;
        }
    }

    pub fn len(&self) -> usize {
        self.fanout.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fanout.channels.is_empty()
    }
}
