use serde::{Deserialize, Serialize};

use crate::session::RunStatus;
use crate::telemetry::LogEntry;

/// Body of `start_run`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunRequest {
    /// Provisional, locally generated run id.
    pub run_id: String,
    pub capsule_id: String,
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

/// Answer to `start_run`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartRunResponse {
    /// 2xx.
    pub ok: bool,
    /// HTTP status.
    pub status: u16,
    /// Server-confirmed run id; `None` when the body could not be read.
    pub run_id: Option<String>,
    /// Quota details carried by a 429.
    pub quota: Option<QuotaRejection>,
}

impl StartRunResponse {
    /// Quota-exceeded answer.
    pub fn is_quota_exceeded(&self) -> bool {
        self.status == 429
    }
}

/// Machine-readable reason carried by a quota rejection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaReason {
    /// Too many runs at once for the plan.
    ConcurrentRunsExceeded,
    /// Monthly run allowance used up.
    MonthlyQuotaExceeded,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Plan limits reported with a quota rejection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimits {
    #[serde(default)]
    pub max_runs: Option<u32>,
    #[serde(default)]
    pub max_concurrent_runs: Option<u32>,
}

/// Body of a 429 answer to `start_run`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRejection {
    #[serde(default)]
    pub reason: QuotaReason,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub limits: QuotaLimits,
    #[serde(default)]
    pub runs_this_month: Option<u32>,
    #[serde(default)]
    pub active_runs: Option<u32>,
}

impl QuotaRejection {
    /// Plan-aware message distinguishing concurrency from monthly exhaustion.
    ///
    /// # Example
    /// ```
    /// use capsulevisor::{QuotaLimits, QuotaReason, QuotaRejection};
    ///
    /// let q = QuotaRejection {
    ///     reason: QuotaReason::MonthlyQuotaExceeded,
    ///     plan: Some("free".into()),
    ///     limits: QuotaLimits { max_runs: Some(5), max_concurrent_runs: None },
    ///     runs_this_month: Some(5),
    ///     active_runs: None,
    /// };
    /// assert_eq!(
    ///     q.user_message(),
    ///     "Free plan monthly run limit reached (5/5). Upgrade to keep running."
    /// );
    /// ```
    pub fn user_message(&self) -> String {
        let plan = self.plan_label();
        match self.reason {
            QuotaReason::ConcurrentRunsExceeded => match self.limits.max_concurrent_runs {
                Some(max) => format!(
                    "{plan} plan allows {max} concurrent run{}. Stop another run first.",
                    if max == 1 { "" } else { "s" }
                ),
                None => format!("{plan} plan concurrent run limit reached. Stop another run first."),
            },
            QuotaReason::MonthlyQuotaExceeded => {
                match (self.runs_this_month, self.limits.max_runs) {
                    (Some(used), Some(max)) => format!(
                        "{plan} plan monthly run limit reached ({used}/{max}). Upgrade to keep running."
                    ),
                    _ => format!("{plan} plan monthly run limit reached. Upgrade to keep running."),
                }
            }
            QuotaReason::Unknown => "Run limit reached. Try again later.".to_string(),
        }
    }

    fn plan_label(&self) -> String {
        let raw = self.plan.as_deref().map(str::trim).unwrap_or("");
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "Your".to_string(),
        }
    }
}

/// Body of `complete_run` (and of the teardown beacon).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRunRequest {
    pub run_id: String,
    pub capsule_id: String,
    pub post_id: String,
    pub duration_ms: u64,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

/// Body of `append_logs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendLogsRequest {
    pub capsule_id: String,
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    pub logs: Vec<LogEntry>,
}
