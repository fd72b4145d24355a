//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for reacting to session events
//! published on the [`Bus`](crate::Bus): UI glue, audit, metrics.
//!
//! ## Architecture
//! ```text
//!   SessionController ── publish(Event) ──► Bus ──► SubscriberSet::listen
//!                                                        │
//!                                          ┌─────────────┼─────────────┐
//!                                          ▼             ▼             ▼
//!                                      LogWriter      Toasts        Custom
//! ```
//!
//! ## Implementing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use capsulevisor::{Event, EventKind, Subscribe};
//!
//! struct Toasts;
//!
//! #[async_trait]
//! impl Subscribe for Toasts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ToastShown {
//!             // render event.reason
//!         }
//!     }
//!     fn name(&self) -> &'static str { "toasts" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
