use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Which execution surface a capsule boots into; selects the boot budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    /// Rendered directly by the client surface.
    #[default]
    Client,
    /// Boots a container runtime inside the surface before the capsule starts.
    Webcontainer,
}

/// Capsule/post identifiers a run is accounted against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunContext {
    /// Capsule being executed.
    pub capsule_id: String,
    /// Post the capsule is embedded in.
    pub post_id: String,
    /// Built artifact, when the capsule was produced by an import/build.
    pub artifact_id: Option<String>,
    /// Surface kind.
    pub runner: RunnerKind,
}

impl RunContext {
    /// Creates a client-runner context without an artifact.
    pub fn new(capsule_id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            capsule_id: capsule_id.into(),
            post_id: post_id.into(),
            artifact_id: None,
            runner: RunnerKind::Client,
        }
    }

    /// Returns a new context with the given artifact.
    pub fn with_artifact(mut self, artifact_id: impl Into<String>) -> Self {
        self.artifact_id = Some(artifact_id.into());
        self
    }

    /// Returns a new context with the given runner kind.
    pub fn with_runner(mut self, runner: RunnerKind) -> Self {
        self.runner = runner;
        self
    }

    /// Both identifiers are non-empty.
    pub fn is_resolvable(&self) -> bool {
        !self.capsule_id.trim().is_empty() && !self.post_id.trim().is_empty()
    }
}

/// Terminal status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt, owned by a single [`SessionController`](super::SessionController).
#[derive(Clone, Debug)]
pub struct Session {
    /// Server-confirmed run id, or the provisional id when the response was unreadable.
    pub id: String,
    /// Milliseconds since the Unix epoch at which start-run was issued.
    pub started_at: u64,
    started: Instant,
}

impl Session {
    pub(crate) fn begin(id: String) -> Self {
        Self {
            id,
            started_at: epoch_millis(SystemTime::now()),
            started: Instant::now(),
        }
    }

    /// Monotonic time since start-run was issued.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub(crate) fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
