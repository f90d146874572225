//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore`, asks the container manager
//! for live state, or queues a job; responses share one JSON envelope.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use hoist_core::DeploymentConfig;
use hoist_jobs::{Job, JobError};
use hoist_state::StateError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn state_error(e: StateError) -> Response {
    let status = match &e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

fn job_error(e: JobError) -> Response {
    let status = match &e {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::QueueFull | JobError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        JobError::Workflow(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status)
}

// ── Deployments ────────────────────────────────────────────────

/// GET /api/v1/deployments
pub async fn list_deployments(State(state): State<ApiState>) -> Response {
    match state.store.list_deployments() {
        Ok(deployments) => ApiResponse::ok(deployments).into_response(),
        Err(e) => state_error(e),
    }
}

/// GET /api/v1/deployments/{name}
pub async fn get_deployment(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_deployment(&name) {
        Ok(config) => ApiResponse::ok(config).into_response(),
        Err(e) => state_error(e),
    }
}

/// POST /api/v1/deployments
pub async fn save_deployment(
    State(state): State<ApiState>,
    Json(config): Json<DeploymentConfig>,
) -> Response {
    match state.store.save_deployment(config) {
        Ok(saved) => {
            info!(deployment = %saved.name, "deployment saved");
            (StatusCode::CREATED, ApiResponse::ok(saved)).into_response()
        }
        Err(e) => state_error(e),
    }
}

/// DELETE /api/v1/deployments/{name}
pub async fn delete_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.store.delete_deployment(&name) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("deployment not found", StatusCode::NOT_FOUND),
        Err(e) => state_error(e),
    }
}

// ── Jobs ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
}

async fn queue(state: &ApiState, job: Job) -> Response {
    let namespace = job.namespace.clone();
    let kind = job.kind();
    match state.enqueuer.enqueue(job).await {
        Ok(job_id) => {
            info!(deployment = %namespace, %kind, %job_id, "job queued");
            (StatusCode::ACCEPTED, ApiResponse::ok(JobAccepted { job_id })).into_response()
        }
        Err(e) => {
            warn!(deployment = %namespace, error = %e, "job rejected");
            job_error(e)
        }
    }
}

/// POST /api/v1/deployments/{name}/deploy
pub async fn deploy(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_deployment(&name) {
        Ok(config) => queue(&state, Job::create(config, state.retry_policy)).await,
        Err(e) => state_error(e),
    }
}

/// POST /api/v1/deployments/{name}/teardown
///
/// Works without a saved config as long as containers labelled `name`
/// are still around.
pub async fn teardown(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.find_deployment(&name) {
        Ok(Some(config)) => queue(&state, Job::delete(config, state.retry_policy)).await,
        Ok(None) => match state.manager.list_by_deployment(&name).await {
            Ok(containers) if containers.is_empty() => {
                error_response("deployment not found", StatusCode::NOT_FOUND)
            }
            Ok(containers) => {
                warn!(
                    deployment = %name,
                    orphans = containers.len(),
                    "tearing down containers without a saved config"
                );
                queue(&state, Job::delete_orphaned(&name, state.retry_policy)).await
            }
            Err(e) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY),
        },
        Err(e) => state_error(e),
    }
}

// ── Containers ─────────────────────────────────────────────────

/// GET /api/v1/deployments/{name}/containers
pub async fn list_containers(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.manager.list_by_deployment(&name).await {
        Ok(containers) => ApiResponse::ok(containers).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY),
    }
}

// ── Secrets ────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SecretRequest {
    pub key: String,
    pub value: String,
}

/// GET /api/v1/deployments/{name}/secrets
pub async fn list_secrets(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_all_secrets(&name) {
        Ok(secrets) => {
            let redacted: Vec<_> = secrets.into_iter().map(|s| s.redacted()).collect();
            ApiResponse::ok(redacted).into_response()
        }
        Err(e) => state_error(e),
    }
}

/// POST /api/v1/deployments/{name}/secrets
pub async fn add_secret(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<SecretRequest>,
) -> Response {
    match state.store.add_secret(&name, &req.key, &req.value) {
        Ok(secret) => (StatusCode::CREATED, ApiResponse::ok(secret.redacted())).into_response(),
        Err(e) => state_error(e),
    }
}

/// DELETE /api/v1/deployments/{name}/secrets/{key}
pub async fn delete_secret(
    State(state): State<ApiState>,
    Path((name, key)): Path<(String, String)>,
) -> Response {
    match state.store.delete_secret(&name, &key) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => state_error(e),
    }
}

// ── Activity ───────────────────────────────────────────────────

/// Time range for the activity log. Defaults to the last 24 hours.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub deployment: Option<String>,
}

/// GET /api/v1/activity
pub async fn activity(State(state): State<ApiState>, Query(query): Query<ActivityQuery>) -> Response {
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query.from.unwrap_or(to - Duration::hours(24));

    let records = match &query.deployment {
        Some(name) => state.store.activity_for(name, from, to),
        None => state.store.activity_between(from, to),
    };
    match records {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => state_error(e),
    }
}
