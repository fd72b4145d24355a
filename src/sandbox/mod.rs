//! # Sandbox seam.
//!
//! The isolated execution surface is opaque: it pushes [`SandboxSignal`]s into
//! a player ([`SessionController::on_signal`](crate::SessionController::on_signal))
//! and accepts control messages through [`SandboxControl`].
//!
//! ```text
//!   surface ── loading / ready / error / log / stats / bootMetrics ──► SessionController
//!   surface ◄── set_params / restart / kill ─────────────────────────── SessionController
//! ```

mod control;
mod signal;

pub use control::{SandboxControl, SandboxError};
pub use signal::SandboxSignal;
