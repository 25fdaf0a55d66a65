use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::internal::backend::store::JobStatus;
use crate::internal::checks::result::CheckResult;
use crate::internal::gateway::client::{BackendClient, BackendError, BackendJobView};
use crate::internal::gateway::durable::{DurableError, DurableRecord, GatewayStore, TerminalStatus};

/// Client-visible job status. `lost` exists only here: it is the gateway's
/// interpretation of "the backend no longer recognizes this id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayJobStatus {
    Queued,
    Running,
    Done,
    Error,
    Lost,
}

impl From<TerminalStatus> for GatewayJobStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Done => GatewayJobStatus::Done,
            TerminalStatus::Error => GatewayJobStatus::Error,
            TerminalStatus::Lost => GatewayJobStatus::Lost,
        }
    }
}

/// Poll response. Views for the same terminal record serialize identically
/// on every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub status: GatewayJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CheckResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobStatusView {
    fn non_terminal(status: GatewayJobStatus) -> Self {
        JobStatusView {
            status,
            results: None,
            detail: None,
        }
    }

    fn from_record(record: DurableRecord) -> Self {
        JobStatusView {
            status: record.status.into(),
            results: record.results,
            detail: record.detail,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown job {0}")]
    UnknownJob(Uuid),
    #[error("could not submit job to backend: {0}")]
    BackendSubmit(String),
    #[error(transparent)]
    Durable(#[from] DurableError),
}

/// The edge job gateway: id minting, forwarding, lazy polling, remapping,
/// and write-through persistence of terminal results.
///
/// There is deliberately no background loop here. The backend is contacted
/// only in direct response to a client poll, which bounds backend load to
/// active client attention.
pub struct JobGateway {
    store: GatewayStore,
    backend: Arc<dyn BackendClient>,
}

impl JobGateway {
    pub fn new(store: GatewayStore, backend: Arc<dyn BackendClient>) -> Self {
        Self { store, backend }
    }

    /// Forward a submission and return the fresh external id. The external
    /// id is minted independently of anything the backend produces.
    pub async fn submit(
        &self,
        payload: serde_json::Value,
        project_id: &str,
    ) -> Result<Uuid, GatewayError> {
        let external_id = Uuid::new_v4();

        let ack = self
            .backend
            .submit(&payload, project_id)
            .await
            .map_err(|e| GatewayError::BackendSubmit(e.to_string()))?;

        self.store.insert_mapping(external_id, ack.job_id).await?;
        tracing::info!(%external_id, backend_id = %ack.job_id, project = %project_id, "job submitted");

        Ok(external_id)
    }

    /// Resolve the current view of a job, consulting the durable store
    /// first and the backend only when no terminal record exists yet.
    pub async fn poll(&self, external_id: Uuid) -> Result<JobStatusView, GatewayError> {
        if let Some(record) = self.store.terminal(external_id).await? {
            return Ok(JobStatusView::from_record(record));
        }

        let backend_id = self
            .store
            .mapping(external_id)
            .await?
            .ok_or(GatewayError::UnknownJob(external_id))?;

        match self.backend.job_status(backend_id).await {
            Ok(view) => self.reconcile(external_id, view).await,
            Err(BackendError::UnknownJob(_)) => {
                // The backend forgot a job it once acknowledged, which means
                // it restarted and dropped its volatile store. Terminal, but
                // distinct from a genuine execution error.
                tracing::warn!(%external_id, %backend_id, "backend lost the job");
                let record = DurableRecord {
                    external_id,
                    status: TerminalStatus::Lost,
                    results: None,
                    detail: Some(
                        "backend no longer recognizes this job; it was likely dropped by a backend restart"
                            .to_string(),
                    ),
                };
                self.persist(record).await
            }
            Err(BackendError::Transient(reason)) => {
                // Never terminal: a slow or briefly unreachable backend must
                // not get its job declared dead.
                tracing::warn!(%external_id, %backend_id, %reason, "backend unreachable, reporting still running");
                Ok(JobStatusView::non_terminal(GatewayJobStatus::Running))
            }
        }
    }

    async fn reconcile(
        &self,
        external_id: Uuid,
        view: BackendJobView,
    ) -> Result<JobStatusView, GatewayError> {
        let status = match view.status {
            JobStatus::Queued => return Ok(JobStatusView::non_terminal(GatewayJobStatus::Queued)),
            JobStatus::Running => {
                return Ok(JobStatusView::non_terminal(GatewayJobStatus::Running))
            }
            JobStatus::Done => TerminalStatus::Done,
            JobStatus::Error => TerminalStatus::Error,
        };

        let record = DurableRecord {
            external_id,
            status,
            results: view.results,
            detail: view.detail,
        };
        self.persist(record).await
    }

    /// Idempotent write-through: if another poll already persisted a
    /// terminal record, serve that one instead of this call's view.
    async fn persist(&self, record: DurableRecord) -> Result<JobStatusView, GatewayError> {
        let external_id = record.external_id;
        let written = self.store.upsert_terminal(&record).await?;
        if written {
            return Ok(JobStatusView::from_record(record));
        }
        let stored = self
            .store
            .terminal(external_id)
            .await?
            .ok_or(GatewayError::UnknownJob(external_id))?;
        Ok(JobStatusView::from_record(stored))
    }
}
