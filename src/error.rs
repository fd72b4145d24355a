//! Errors of the backend transport ([`BackendError`]) and of session start
//! ([`SessionError`]).
//!
//! Neither type escapes the public [`SessionController`](crate::SessionController)
//! operations: they are rendered into events (`as_label`) and toasts (`as_message`).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the backend transport.
///
/// None of these are retried synchronously; callers record them to the
/// error-tracking sink and move on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No credentials are available; the request was never attempted.
    #[error("missing auth context")]
    MissingAuth,

    /// The request could not be delivered (connection, DNS, TLS, timeout).
    #[error("transport failed: {error}")]
    Transport {
        /// The underlying error message.
        error: String,
    },

    /// The backend answered with an unexpected non-2xx status.
    #[error("unexpected status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("decode failed: {error}")]
    Decode {
        /// The underlying error message.
        error: String,
    },
}

impl BackendError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use capsulevisor::BackendError;
    ///
    /// assert_eq!(BackendError::MissingAuth.as_label(), "missing_auth");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BackendError::MissingAuth => "missing_auth",
            BackendError::Transport { .. } => "transport_failed",
            BackendError::Status { .. } => "unexpected_status",
            BackendError::Decode { .. } => "decode_failed",
        }
    }
}

/// # Reasons a session could not be started.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Every runtime slot in the process is taken.
    #[error("runtime slots exhausted ({active}/{max})")]
    AdmissionDenied {
        /// Slots held at the time of the request.
        active: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A recent quota rejection is still cooling down.
    #[error("start suppressed for another {remaining:?}")]
    CoolingDown {
        /// Time left until starts are allowed again.
        remaining: Duration,
    },

    /// The backend refused the run with a quota (429) response.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        /// Plan-aware user message.
        message: String,
    },

    /// No capsule/post context is bound to the player.
    #[error("no capsule context bound")]
    MissingContext,

    /// The backend refused the run with a non-quota status.
    #[error("start rejected with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The player was stopped while the start-run call was in flight.
    #[error("start aborted by a stop request")]
    Aborted,

    /// The start-run call failed in transport.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use capsulevisor::SessionError;
    ///
    /// let err = SessionError::AdmissionDenied { active: 2, max: 2 };
    /// assert_eq!(err.as_label(), "concurrency_limit");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::AdmissionDenied { .. } => "concurrency_limit",
            SessionError::CoolingDown { .. } => "rate_limited",
            SessionError::QuotaExceeded { .. } => "quota_exceeded",
            SessionError::MissingContext => "missing_context",
            SessionError::Rejected { .. } => "start_rejected",
            SessionError::Aborted => "start_aborted",
            SessionError::Backend(e) => e.as_label(),
        }
    }

    /// Returns the short user-facing message shown as a toast.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::AdmissionDenied { max, .. } => {
                format!("Only {max} capsules can run at once. Stop another run first.")
            }
            SessionError::CoolingDown { remaining } => {
                format!(
                    "Run limit reached. Try again in {}s.",
                    remaining.as_secs().max(1)
                )
            }
            SessionError::QuotaExceeded { message } => message.clone(),
            SessionError::MissingContext => "This capsule is not ready to run.".to_string(),
            SessionError::Aborted => "The run was stopped before it started.".to_string(),
            SessionError::Rejected { .. } | SessionError::Backend(_) => {
                "Could not start the run. Please try again.".to_string()
            }
        }
    }

    /// Indicates whether the failure is a user-visible condition (toast)
    /// rather than a silent no-op.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            SessionError::MissingContext
                | SessionError::Aborted
                | SessionError::Backend(BackendError::MissingAuth)
        )
    }
}
