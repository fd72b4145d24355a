//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to the observable effects of player sessions.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SessionController`, `TelemetryBatcher`, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: UI glue (toasts, running state), the error-tracking sink,
//!   and any [`Subscribe`](crate::Subscribe) implementation wired through
//!   [`SubscriberSet::listen`](crate::SubscriberSet::listen).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
