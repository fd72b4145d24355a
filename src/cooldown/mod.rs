//! # Local rate-limit guard.
//!
//! After the backend answers a start-run call with a quota rejection, the
//! guard suppresses further start attempts until a fixed window elapses, so a
//! player never hammers a backend that already signals overload.
//!
//! ```text
//! start_run ──► 429 ──► guard.start_cooldown(30s)
//!                            │
//!   T+10s start ──► is_cooling_down() == true  ──► refused locally (no call)
//!   T+31s start ──► is_cooling_down() == false ──► start_run issued
//! ```
//!
//! The guard only reads the local monotonic clock; nothing is persisted.

mod guard;

pub use guard::RateLimitGuard;
