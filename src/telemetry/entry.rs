use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::session::epoch_millis;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parses the level names sandboxes emit (`log` maps to `info`).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "debug" | "trace" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

/// One queued telemetry record (`PendingLogEntry`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Producer (`console`, `runtime`, `perf`, ...).
    pub source: String,
    /// Probability with which this entry was kept; set when enqueued.
    pub sample_rate: f64,
}

impl LogEntry {
    /// Entry stamped with the current time and a sample rate of 1.
    pub fn new(level: LogLevel, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: epoch_millis(SystemTime::now()),
            source: source.into(),
            sample_rate: 1.0,
        }
    }

    /// Returns a new entry with the given timestamp (ms since epoch).
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}
