//! Ephemeral, process-lifetime job state on the compute side.
//!
//! Reset-on-restart is the contract, not an accident: the store lives in
//! backend process memory only, and a restart drops every in-flight job.
//! Lookups for a dropped id return `None`, which the HTTP layer turns into
//! a distinguishable "unknown id" response for the gateway to classify.
//! The backend itself never knows a `lost` state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::internal::checks::result::CheckResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub results: Option<Vec<CheckResult>>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown job {0}")]
    UnknownJob(Uuid),
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
}

/// Keyed in-memory job map. Cloning shares the underlying map; the serving
/// component owns one instance and hands clones to handlers and job tasks.
#[derive(Clone, Default)]
pub struct JobStore {
    inner: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `queued` and return its backend-local id.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            status: JobStatus::Queued,
            results: None,
            error_detail: None,
            created_at: Utc::now(),
        };
        self.inner.write().await.insert(id, job);
        id
    }

    pub async fn mark_running(&self, id: Uuid) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Running, |job| {
            job.status = JobStatus::Running;
        })
        .await
    }

    pub async fn complete(&self, id: Uuid, results: Vec<CheckResult>) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Done, |job| {
            job.status = JobStatus::Done;
            job.results = Some(results);
        })
        .await
    }

    pub async fn fail(&self, id: Uuid, detail: String) -> Result<(), StoreError> {
        self.transition(id, JobStatus::Error, |job| {
            job.status = JobStatus::Error;
            job.error_detail = Some(detail);
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Apply `update` only if the queued→running→{done,error} order allows
    /// moving to `to`. Transitions hold the write lock, so per-key updates
    /// are atomic; there is no global lock beyond this map access.
    async fn transition<F>(&self, id: Uuid, to: JobStatus, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.inner.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::UnknownJob(id))?;
        let allowed = matches!(
            (job.status, to),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        );
        if !allowed {
            return Err(StoreError::IllegalTransition {
                from: job.status,
                to,
            });
        }
        update(job);
        Ok(())
    }
}
