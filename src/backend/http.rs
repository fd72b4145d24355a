use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

use super::traits::{RunBackend, TokenSource};
use super::types::{
    AppendLogsRequest, CompleteRunRequest, QuotaRejection, StartRunRequest, StartRunResponse,
};

/// Per-request timeout; none of these calls may hold up UI state.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRunBody {
    run_id: Option<String>,
}

/// [`RunBackend`] over HTTPS + JSON.
///
/// Routes (relative to `base`):
/// - `POST runs/start`
/// - `POST runs/{runId}/complete`
/// - `POST runs/{runId}/logs`
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpBackend {
    /// Creates a backend rooted at `base` (e.g. `https://api.example.com/v1/`).
    pub fn new(base: &str, tokens: Arc<dyn TokenSource>) -> Result<Self, BackendError> {
        let mut base = Url::parse(base).map_err(|e| BackendError::Transport {
            error: format!("invalid base url: {e}"),
        })?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Transport {
                error: "base url cannot carry a path".to_string(),
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        Ok(Self {
            client,
            base,
            tokens,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| BackendError::Transport {
                error: "base url cannot carry a path".to_string(),
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<reqwest::Response, BackendError> {
        let token = self.tokens.bearer_token().ok_or(BackendError::MissingAuth)?;
        self.client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport)
    }
}

#[async_trait]
impl RunBackend for HttpBackend {
    async fn start_run(&self, req: &StartRunRequest) -> Result<StartRunResponse, BackendError> {
        let resp = self.post(self.url(&["runs", "start"])?, req).await?;
        let status = resp.status();

        if status.is_success() {
            let run_id = resp
                .json::<StartRunBody>()
                .await
                .ok()
                .and_then(|b| b.run_id)
                .filter(|id| !id.trim().is_empty());
            return Ok(StartRunResponse {
                ok: true,
                status: status.as_u16(),
                run_id,
                quota: None,
            });
        }

        let quota = if status == StatusCode::TOO_MANY_REQUESTS {
            resp.json::<QuotaRejection>().await.ok()
        } else {
            None
        };
        Ok(StartRunResponse {
            ok: false,
            status: status.as_u16(),
            run_id: None,
            quota,
        })
    }

    async fn complete_run(&self, req: &CompleteRunRequest) -> Result<(), BackendError> {
        let url = self.url(&["runs", &req.run_id, "complete"])?;
        let resp = self.post(url, req).await?;
        check(resp.status())
    }

    async fn append_logs(&self, run_id: &str, req: &AppendLogsRequest) -> Result<(), BackendError> {
        let url = self.url(&["runs", run_id, "logs"])?;
        let resp = self.post(url, req).await?;
        check(resp.status())
    }
}

fn check(status: StatusCode) -> Result<(), BackendError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(BackendError::Status {
            status: status.as_u16(),
        })
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport {
        error: e.to_string(),
    }
}
