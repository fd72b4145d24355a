use async_trait::async_trait;

use crate::error::BackendError;

use super::types::{AppendLogsRequest, CompleteRunRequest, StartRunRequest, StartRunResponse};

/// Request/response contract of the run-accounting backend.
///
/// A non-2xx answer to `start_run` is **not** an error: it comes back as
/// `Ok(StartRunResponse { ok: false, .. })` so the caller can read the status
/// and quota details. Errors are reserved for calls that produced no usable
/// answer.
#[async_trait]
pub trait RunBackend: Send + Sync + 'static {
    /// Registers a run; the backend may replace the provisional id.
    async fn start_run(&self, req: &StartRunRequest) -> Result<StartRunResponse, BackendError>;

    /// Reports the single terminal outcome of a run.
    async fn complete_run(&self, req: &CompleteRunRequest) -> Result<(), BackendError>;

    /// Appends a batch of sampled log entries to a run.
    async fn append_logs(&self, run_id: &str, req: &AppendLogsRequest) -> Result<(), BackendError>;
}

/// Teardown-safe terminal report.
///
/// `send_complete` must hand the record off before returning and must not
/// depend on the caller staying alive until delivery.
pub trait Beacon: Send + Sync + 'static {
    fn send_complete(&self, req: &CompleteRunRequest) -> Result<(), BackendError>;
}

/// Source of bearer credentials.
pub trait TokenSource: Send + Sync + 'static {
    /// Current token, or `None` when the user is signed out.
    fn bearer_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

/// Fixed token (or a fixed absence of one).
#[derive(Clone, Debug, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
