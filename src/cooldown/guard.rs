use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Tracks a single `cooldown_until` deadline.
///
/// Share one guard (`Arc`) between all players of a process so a quota
/// rejection seen by one player suppresses starts in the others.
#[derive(Debug, Default)]
pub struct RateLimitGuard {
    until: Mutex<Option<Instant>>,
}

impl RateLimitGuard {
    /// Creates a guard that is not cooling down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `cooldown_until = now + duration`.
    ///
    /// A shorter window never cuts an active longer one short.
    pub fn start_cooldown(&self, duration: Duration) {
        let candidate = Instant::now() + duration;
        let mut until = self.until.lock();
        match *until {
            Some(current) if current >= candidate => {}
            _ => *until = Some(candidate),
        }
        tracing::info!(cooldown_ms = duration.as_millis() as u64, "start cooldown armed");
    }

    /// True while `now < cooldown_until`.
    pub fn is_cooling_down(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left in the current window, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let until = (*self.until.lock())?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }

    /// Clears the window.
    pub fn reset(&self) {
        *self.until.lock() = None;
    }
}
