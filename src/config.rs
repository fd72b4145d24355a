//! # Session runtime configuration.
//!
//! Provides [`SessionConfig`], the centralized knobs for admission, budgets,
//! telemetry sampling and rate limiting.
//!
//! Config is built in two ways:
//! 1. **Defaults**: `SessionConfig::default()`
//! 2. **Environment overlay**: `SessionConfig::from_env()` reads `CAPSULE_*` variables
//!
//! ## Sentinel values
//! - `run_budget = 0s` → no run-duration budget (treated as `None` by [`SessionConfig::run_budget_limit`])
//! - `max_concurrent_runners = 0` → clamped to 1 (a player must be able to run something)

use std::time::Duration;

use thiserror::Error;

use crate::session::RunnerKind;

/// Error returned by [`SessionConfig::from_env`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Configuration for session controllers and the shared admission registry.
///
/// ## Field semantics
/// - `boot_budget_*`: time from `loading` to `ready` before a `boot_timeout` violation
/// - `run_budget`: time from confirmed start before a `run_timeout` violation (`0s` = none)
/// - `max_concurrent_runners`: process-wide cap on held runtime slots
/// - `log_sample_rate`: probability a non-error log entry is kept
/// - `log_batch_target` / `log_batch_interval`: size and time flush triggers
/// - `perf_min_interval` / `perf_sample_rate`: perf telemetry throttle
/// - `rate_limit_cooldown`: local start suppression after a quota rejection
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Boot budget for capsules rendered directly in the client surface.
    pub boot_budget_client: Duration,
    /// Boot budget for capsules that boot a container runtime first.
    pub boot_budget_webcontainer: Duration,
    /// Maximum run duration after the backend confirms the run.
    pub run_budget: Duration,
    /// Maximum simultaneously held runtime slots.
    pub max_concurrent_runners: usize,
    /// Sample rate for non-error log entries, in `[0, 1]`.
    pub log_sample_rate: f64,
    /// Pending entries that trigger an immediate flush.
    pub log_batch_target: usize,
    /// Deferred flush delay measured from the first unflushed entry.
    pub log_batch_interval: Duration,
    /// Minimum spacing between two admitted perf samples.
    pub perf_min_interval: Duration,
    /// Sample rate for perf samples that pass the interval gate, in `[0, 1]`.
    pub perf_sample_rate: f64,
    /// Start suppression window after a quota rejection.
    pub rate_limit_cooldown: Duration,
    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl SessionConfig {
    /// Returns the boot budget for the given runner kind.
    #[inline]
    pub fn boot_budget(&self, kind: RunnerKind) -> Duration {
        match kind {
            RunnerKind::Client => self.boot_budget_client,
            RunnerKind::Webcontainer => self.boot_budget_webcontainer,
        }
    }

    /// Returns the run budget as an `Option`.
    ///
    /// - `None` → runs are never cut off by time
    /// - `Some(d)` → `run_timeout` after `d`
    #[inline]
    pub fn run_budget_limit(&self) -> Option<Duration> {
        if self.run_budget == Duration::ZERO {
            None
        } else {
            Some(self.run_budget)
        }
    }

    /// Returns the slot cap clamped to a minimum of 1.
    #[inline]
    pub fn max_runners_clamped(&self) -> usize {
        self.max_concurrent_runners.max(1)
    }

    /// Returns the batch target clamped to a minimum of 1.
    #[inline]
    pub fn batch_target_clamped(&self) -> usize {
        self.log_batch_target.max(1)
    }

    /// Returns the log sample rate clamped to `[0, 1]` (NaN → 0).
    #[inline]
    pub fn log_sample_rate_clamped(&self) -> f64 {
        clamp_rate(self.log_sample_rate)
    }

    /// Returns the perf sample rate clamped to `[0, 1]` (NaN → 0).
    #[inline]
    pub fn perf_sample_rate_clamped(&self) -> f64 {
        clamp_rate(self.perf_sample_rate)
    }

    /// Builds a config from `CAPSULE_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup over the defaults.
    ///
    /// Unset keys keep their default; set-but-invalid keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_BOOT_BUDGET_CLIENT_MS")? {
            cfg.boot_budget_client = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_BOOT_BUDGET_WEBCONTAINER_MS")? {
            cfg.boot_budget_webcontainer = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_RUN_BUDGET_MS")? {
            cfg.run_budget = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<usize>(&lookup, "CAPSULE_MAX_CONCURRENT_RUNNERS")? {
            cfg.max_concurrent_runners = n.max(1);
        }
        if let Some(rate) = parse::<f64>(&lookup, "CAPSULE_LOG_SAMPLE_RATE")? {
            cfg.log_sample_rate = clamp_rate(rate);
        }
        if let Some(n) = parse::<usize>(&lookup, "CAPSULE_LOG_BATCH_TARGET")? {
            cfg.log_batch_target = n.max(1);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_LOG_BATCH_INTERVAL_MS")? {
            cfg.log_batch_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_PERF_MIN_INTERVAL_MS")? {
            cfg.perf_min_interval = Duration::from_millis(ms);
        }
        if let Some(rate) = parse::<f64>(&lookup, "CAPSULE_PERF_SAMPLE_RATE")? {
            cfg.perf_sample_rate = clamp_rate(rate);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CAPSULE_RATE_LIMIT_COOLDOWN_MS")? {
            cfg.rate_limit_cooldown = Duration::from_millis(ms);
        }

        Ok(cfg)
    }
}

impl Default for SessionConfig {
    /// Default configuration:
    ///
    /// - boot budget: client 10s, webcontainer 30s
    /// - `run_budget = 10min`
    /// - `max_concurrent_runners = 2`
    /// - `log_sample_rate = 0.2`, `log_batch_target = 10`, `log_batch_interval = 1500ms`
    /// - `perf_min_interval = 2000ms`, `perf_sample_rate = 0.25`
    /// - `rate_limit_cooldown = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            boot_budget_client: Duration::from_secs(10),
            boot_budget_webcontainer: Duration::from_secs(30),
            run_budget: Duration::from_secs(600),
            max_concurrent_runners: 2,
            log_sample_rate: 0.2,
            log_batch_target: 10,
            log_batch_interval: Duration::from_millis(1500),
            perf_min_interval: Duration::from_millis(2000),
            perf_sample_rate: 0.25,
            rate_limit_cooldown: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_keeps_defaults() {
        let cfg = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.max_concurrent_runners, 2);
        assert_eq!(cfg.log_batch_target, 10);
        assert_eq!(cfg.rate_limit_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn overlays_and_clamps() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("CAPSULE_MAX_CONCURRENT_RUNNERS", "0"),
            ("CAPSULE_LOG_SAMPLE_RATE", "4.5"),
            ("CAPSULE_RUN_BUDGET_MS", "0"),
            ("CAPSULE_BOOT_BUDGET_WEBCONTAINER_MS", " 45000 "),
        ]))
        .unwrap();

        assert_eq!(cfg.max_concurrent_runners, 1);
        assert_eq!(cfg.log_sample_rate, 1.0);
        assert_eq!(cfg.run_budget_limit(), None);
        assert_eq!(
            cfg.boot_budget(RunnerKind::Webcontainer),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn programmatic_nan_rates_clamp_to_zero() {
        let cfg = SessionConfig {
            log_sample_rate: f64::NAN,
            perf_sample_rate: -0.5,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.log_sample_rate_clamped(), 0.0);
        assert_eq!(cfg.perf_sample_rate_clamped(), 0.0);
    }

    #[test]
    fn invalid_value_names_the_key() {
        let err = SessionConfig::from_lookup(lookup(&[("CAPSULE_LOG_BATCH_TARGET", "ten")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "CAPSULE_LOG_BATCH_TARGET",
                value: "ten".to_string()
            }
        );
    }
}
