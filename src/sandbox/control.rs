use async_trait::async_trait;
use thiserror::Error;

/// A control message could not be confirmed delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sandbox unreachable: {reason}")]
pub struct SandboxError {
    pub reason: String,
}

impl SandboxError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Control messages sent to the execution surface.
///
/// Delivery may fail (surface already gone, frame detached); callers must not
/// let a failure here change what the user sees.
#[async_trait]
pub trait SandboxControl: Send + Sync + 'static {
    /// Pushes new parameter values into the running capsule.
    async fn set_params(&self, values: serde_json::Value) -> Result<(), SandboxError>;

    /// Reloads the capsule from scratch.
    async fn restart(&self) -> Result<(), SandboxError>;

    /// Terminates the capsule.
    async fn kill(&self) -> Result<(), SandboxError>;
}
