use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::internal::backend::store::JobStatus;
use crate::internal::checks::result::CheckResult;

#[derive(Debug, Deserialize)]
pub struct BackendSubmitAck {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendJobView {
    pub status: JobStatus,
    #[serde(default)]
    pub results: Option<Vec<CheckResult>>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// The two failure classes the poll path distinguishes. Everything that is
/// not a positive "I don't know this id" from the backend is transient.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend does not recognize job {0}")]
    UnknownJob(Uuid),
    #[error("transient backend failure: {0}")]
    Transient(String),
}

/// Gateway-side view of the compute backend.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn submit(
        &self,
        payload: &serde_json::Value,
        project_id: &str,
    ) -> Result<BackendSubmitAck, BackendError>;

    async fn job_status(&self, backend_id: Uuid) -> Result<BackendJobView, BackendError>;
}

/// HTTP implementation. Every call carries the configured bounded timeout;
/// a timeout surfaces as `Transient`, never as a terminal failure.
pub struct HttpBackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn submit(
        &self,
        payload: &serde_json::Value,
        project_id: &str,
    ) -> Result<BackendSubmitAck, BackendError> {
        let response = self
            .client
            .post(format!("{}/v1/jobs", self.base_url))
            .json(&serde_json::json!({
                "payload": payload,
                "project_id": project_id,
            }))
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Transient(format!(
                "backend responded with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))
    }

    async fn job_status(&self, backend_id: Uuid) -> Result<BackendJobView, BackendError> {
        let response = self
            .client
            .get(format!("{}/v1/jobs/{}", self.base_url, backend_id))
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::UnknownJob(backend_id));
        }
        if !response.status().is_success() {
            return Err(BackendError::Transient(format!(
                "backend responded with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))
    }
}
