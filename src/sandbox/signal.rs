use serde::{Deserialize, Serialize};

use crate::telemetry::{LogEntry, LogLevel};

/// Lifecycle signal pushed by the execution surface.
///
/// Deserializes from the surface's tagged JSON messages, e.g.
/// `{"type":"log","level":"warn","message":"..","timestamp":1700000000000}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SandboxSignal {
    /// The surface started booting.
    Loading,
    /// The capsule finished booting.
    Ready,
    /// The capsule crashed.
    Error { message: String },
    /// A console line.
    Log {
        level: LogLevel,
        message: String,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    /// Periodic performance sample.
    Stats {
        fps: f64,
        #[serde(default)]
        memory: Option<u64>,
    },
    /// Boot duration measured inside the surface.
    #[serde(rename_all = "camelCase")]
    BootMetrics { boot_time_ms: u64 },
}

impl SandboxSignal {
    /// Shorthand for [`SandboxSignal::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        SandboxSignal::Error {
            message: message.into(),
        }
    }

    /// Shorthand for a `log` signal stamped now.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        SandboxSignal::Log {
            level,
            message: message.into(),
            timestamp: None,
        }
    }

    /// Telemetry entry for signals that carry one.
    pub(crate) fn to_entry(&self) -> Option<LogEntry> {
        match self {
            SandboxSignal::Error { message } => {
                Some(LogEntry::new(LogLevel::Error, message.clone(), "runtime"))
            }
            SandboxSignal::Log {
                level,
                message,
                timestamp,
            } => {
                let entry = LogEntry::new(*level, message.clone(), "console");
                Some(match timestamp {
                    Some(ts) => entry.at(*ts),
                    None => entry,
                })
            }
            SandboxSignal::Stats { fps, memory } => {
                let message = match memory {
                    Some(bytes) => format!("stats fps={fps:.1} memory={bytes}"),
                    None => format!("stats fps={fps:.1}"),
                };
                Some(LogEntry::new(LogLevel::Info, message, "perf"))
            }
            SandboxSignal::BootMetrics { boot_time_ms } => Some(LogEntry::new(
                LogLevel::Info,
                format!("boot_time_ms={boot_time_ms}"),
                "perf",
            )),
            SandboxSignal::Loading | SandboxSignal::Ready => None,
        }
    }

    /// Performance samples go through the perf throttle.
    pub(crate) fn is_perf(&self) -> bool {
        matches!(
            self,
            SandboxSignal::Stats { .. } | SandboxSignal::BootMetrics { .. }
        )
    }
}
