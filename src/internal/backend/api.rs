use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::internal::checks::executor::{CheckExecutor, ExecOptions};
use crate::internal::checks::registry::{CheckOptions, CheckerRegistry};
use crate::internal::checks::result::CheckResult;
use crate::internal::backend::store::{JobStatus, JobStore};
use crate::internal::model::handle::ModelHandle;

/// Shared state for the backend API: the volatile job store plus the
/// registry discovered at process start.
#[derive(Clone)]
pub struct BackendState {
    pub store: JobStore,
    pub registry: Arc<CheckerRegistry>,
}

impl BackendState {
    pub fn new(registry: Arc<CheckerRegistry>) -> Self {
        Self {
            store: JobStore::new(),
            registry,
        }
    }
}

pub fn create_backend_router(state: BackendState) -> Router {
    Router::new()
        .route("/v1/jobs", post(submit_job))
        .route("/v1/jobs/:job_id", get(job_status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub payload: serde_json::Value,
    pub project_id: String,
    /// Keyword options per check function name.
    #[serde(default)]
    pub options: HashMap<String, CheckOptions>,
    /// When present, only the named check functions run.
    #[serde(default)]
    pub only: Option<HashSet<String>>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// External status view of one job. Unknown ids get a distinct body so the
/// gateway can tell "gone after restart" apart from a server fault.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CheckResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

async fn submit_job(
    State(state): State<BackendState>,
    Json(request): Json<SubmitJobRequest>,
) -> Json<SubmitJobResponse> {
    let job_id = state.store.create().await;
    tracing::info!(%job_id, project = %request.project_id, "job queued");

    // Execution is decoupled from the submission request: return as soon
    // as the job is registered and let the task drive the state machine.
    tokio::spawn(run_job(state.clone(), job_id, request));

    Json(SubmitJobResponse {
        job_id,
        status: JobStatus::Queued,
    })
}

async fn run_job(state: BackendState, job_id: Uuid, request: SubmitJobRequest) {
    if let Err(e) = state.store.mark_running(job_id).await {
        tracing::error!(%job_id, error = %e, "could not start job");
        return;
    }

    let model = match ModelHandle::decode(&request.payload, &request.project_id) {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!(%job_id, error = %e, "rejecting job with unusable model");
            if let Err(e) = state.store.fail(job_id, e.to_string()).await {
                tracing::error!(%job_id, error = %e, "could not record job failure");
            }
            return;
        }
    };

    let registry = state.registry.clone();
    let opts = ExecOptions {
        per_function: request.options,
        subset: request.only,
        mode: None,
    };

    // The plugin contract is synchronous; keep it off the async workers.
    let results = tokio::task::spawn_blocking(move || {
        CheckExecutor.run(&registry, &model, &opts)
    })
    .await;

    match results {
        Ok(results) => {
            tracing::info!(%job_id, rows = results.len(), "job done");
            if let Err(e) = state.store.complete(job_id, results).await {
                tracing::error!(%job_id, error = %e, "could not record job results");
            }
        }
        Err(e) => {
            // Executor task itself died; the per-function isolation never
            // lets a plugin do this, so treat it as a backend fault.
            tracing::error!(%job_id, error = %e, "execution task failed");
            if let Err(e) = state.store.fail(job_id, format!("execution task failed: {}", e)).await {
                tracing::error!(%job_id, error = %e, "could not record job failure");
            }
        }
    }
}

async fn job_status(
    State(state): State<BackendState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, (StatusCode, Json<serde_json::Value>)> {
    let unknown = || {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "unknown" })),
        )
    };

    // A non-uuid id can never have been issued by this backend.
    let job_id: Uuid = job_id.parse().map_err(|_| unknown())?;
    let job = state.store.get(job_id).await.ok_or_else(unknown)?;

    Ok(Json(JobView {
        status: job.status,
        results: job.results,
        detail: job.error_detail,
    }))
}
