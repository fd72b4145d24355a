//! # Process-wide event bus.
//!
//! Every player, its telemetry batcher and the subscriber workers publish into
//! one [`Bus`]; UI glue, tests and [`SubscriberSet`](crate::SubscriberSet)
//! listen on it.
//!
//! ```text
//!   SessionController #1 ──┐
//!   SessionController #2 ──┼──► Bus ──┬──► toast / running-state glue
//!   TelemetryBatcher     ──┘          ├──► SubscriberSet ──► LogWriter, ...
//!                                     └──► tests
//! ```
//!
//! Publishing never blocks or fails. Events sent while nobody listens are
//! gone; a receiver that falls more than `capacity` events behind sees
//! `RecvError::Lagged` and resumes at the oldest retained event.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the session event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// `capacity` is shared by all receivers; zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        tracing::trace!(kind = ?ev.kind, seq = ev.seq, "event published");
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
