use anyhow::{Context, Result};
use tracing::info;
use url::Url;

use super::messages::{
    SessionMetricsRequest, StartSessionRequest, StartSessionResponse, StopSessionRequest,
    UpdateSessionRequest,
};

/// Control-plane session lifecycle calls.
///
/// Fire-once by contract: no retry logic lives here. Start failures surface to
/// the caller; the coordinator treats the non-start operations as best-effort.
#[async_trait::async_trait]
pub trait SignalingApi: Send + Sync {
    async fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse>;

    async fn update_session(&self, request: UpdateSessionRequest) -> Result<()>;

    async fn stop_session(&self, request: StopSessionRequest) -> Result<()>;

    async fn send_metrics(&self, request: SessionMetricsRequest) -> Result<()>;
}

/// HTTP mapping of the five signaling operations onto the control-plane API.
pub struct HttpSignalingClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpSignalingClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid signaling endpoint path: {}", path))
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("Signaling call to {} failed", url))?;

        response
            .error_for_status()
            .with_context(|| format!("Signaling call to {} rejected", path))
    }
}

#[async_trait::async_trait]
impl SignalingApi for HttpSignalingClient {
    async fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse> {
        info!(
            "Starting session: direction={} model={}",
            request.direction, request.model
        );

        let response = self.post("session/start", &request).await?;
        let started: StartSessionResponse = response
            .json()
            .await
            .context("Invalid session/start response payload")?;

        info!("Session started: id={}", started.session_id);
        Ok(started)
    }

    async fn update_session(&self, request: UpdateSessionRequest) -> Result<()> {
        self.post("session/update", &request).await?;
        Ok(())
    }

    async fn stop_session(&self, request: StopSessionRequest) -> Result<()> {
        info!("Stopping session: id={}", request.session_id);
        self.post("session/stop", &request).await?;
        Ok(())
    }

    async fn send_metrics(&self, request: SessionMetricsRequest) -> Result<()> {
        self.post("session/metrics", &request).await?;
        Ok(())
    }
}
