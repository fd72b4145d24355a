//! # Process-wide admission of runtime slots.
//!
//! Players treat concurrent execution capacity as **slots**. A slot is
//! reserved when a surface begins loading, confirmed once the backend
//! establishes the run, and released on every terminal outcome.
//!
//! ## Invariants
//! - The registry never holds more than `max` live tokens after a `reserve`.
//! - `release` is idempotent; released tokens leave the live set immediately.
//! - Confirmation re-checks the cap against confirmed runs, so a lowered cap
//!   takes effect at the moment runs are established.

mod registry;
mod token;

pub use registry::{Admission, AdmissionRegistry};
pub use token::SlotToken;
