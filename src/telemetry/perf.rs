use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use crate::config::SessionConfig;

/// Throttle for performance samples (`stats`, `bootMetrics`).
///
/// A sample is admitted only if at least `min_interval` passed since the last
/// sample that reached the draw, **and** the draw at `sample_rate` succeeds.
/// A failed draw still consumes the window.
pub struct PerfThrottle {
    min_interval: Duration,
    sample_rate: f64,
    last: Mutex<Option<Instant>>,
    rng: Mutex<StdRng>,
}

impl PerfThrottle {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            min_interval: cfg.perf_min_interval,
            sample_rate: cfg.perf_sample_rate_clamped(),
            last: Mutex::new(None),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replaces the sampling RNG with a seeded one.
    pub fn reseed(&self, seed: u64) {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }

    /// Rate attached to admitted samples.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Decides whether the current perf sample should be recorded.
    pub fn admit(&self) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last.lock();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.min_interval {
                    return false;
                }
            }
            *last = Some(now);
        }
        self.sample_rate >= 1.0 || self.rng.lock().random_bool(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(rate: f64) -> PerfThrottle {
        PerfThrottle::new(&SessionConfig {
            perf_sample_rate: rate,
            ..SessionConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_sample_per_interval() {
        let t = throttle(1.0);
        assert!(t.admit());
        assert!(!t.admit());

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(!t.admit());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(t.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_admits_nothing_but_consumes_window() {
        let t = throttle(0.0);
        assert!(!t.admit());
        tokio::time::advance(Duration::from_millis(2000)).await;
        assert!(!t.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn nan_rate_admits_nothing() {
        let t = throttle(f64::NAN);
        assert_eq!(t.sample_rate(), 0.0);
        assert!(!t.admit());
    }

    #[tokio::test(start_paused = true)]
    async fn quarter_rate_over_many_windows() {
        let t = throttle(0.25);
        t.reseed(42);
        let mut admitted = 0;
        for _ in 0..400 {
            if t.admit() {
                admitted += 1;
            }
            tokio::time::advance(Duration::from_millis(2000)).await;
        }
        assert!((50..=150).contains(&admitted), "admitted {admitted} of 400");
    }
}
