use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::internal::gateway::service::{GatewayError, JobGateway, JobStatusView};

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<JobGateway>,
}

pub fn create_gateway_router(state: GatewayState) -> Router {
    // The gateway is the edge surface, so browser clients talk to it
    // directly.
    Router::new()
        .route("/v1/checks", post(submit_check))
        .route("/v1/checks/:job_id", get(check_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SubmitCheckRequest {
    pub payload: serde_json::Value,
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitCheckResponse {
    pub job_id: Uuid,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn into_api_error(e: GatewayError) -> ApiError {
    let status = match &e {
        GatewayError::UnknownJob(_) => StatusCode::NOT_FOUND,
        GatewayError::BackendSubmit(_) => StatusCode::BAD_GATEWAY,
        GatewayError::Durable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

async fn submit_check(
    State(state): State<GatewayState>,
    Json(request): Json<SubmitCheckRequest>,
) -> Result<Json<SubmitCheckResponse>, ApiError> {
    let job_id = state
        .gateway
        .submit(request.payload, &request.project_id)
        .await
        .map_err(into_api_error)?;

    Ok(Json(SubmitCheckResponse { job_id }))
}

async fn check_status(
    State(state): State<GatewayState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError> {
    // Ids are minted here, so anything that does not parse was never ours.
    let job_id: Uuid = job_id.parse().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown job {}", job_id) })),
        )
    })?;

    let view = state.gateway.poll(job_id).await.map_err(into_api_error)?;
    Ok(Json(view))
}
