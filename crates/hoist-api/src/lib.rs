//! hoist-api: REST API for Hoist.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/deployments` | List saved deployments |
//! | POST | `/api/v1/deployments` | Save (create or replace) a deployment |
//! | GET | `/api/v1/deployments/{name}` | Get one deployment |
//! | DELETE | `/api/v1/deployments/{name}` | Delete the saved config (containers stay) |
//! | POST | `/api/v1/deployments/{name}/deploy` | Queue a create job |
//! | POST | `/api/v1/deployments/{name}/teardown` | Queue a delete job |
//! | GET | `/api/v1/deployments/{name}/containers` | Live containers |
//! | GET | `/api/v1/deployments/{name}/secrets` | List secrets (redacted) |
//! | POST | `/api/v1/deployments/{name}/secrets` | Add or replace a secret |
//! | DELETE | `/api/v1/deployments/{name}/secrets/{key}` | Delete a secret |
//! | GET | `/api/v1/deployments/{name}/events` | WebSocket progress stream |
//! | GET | `/api/v1/activity` | Finished jobs in a time range |

pub mod handlers;
pub mod ws;

use axum::Router;
use axum::routing::{delete, get, post};
use hoist_docker::ContainerManager;
use hoist_events::EventEmitter;
use hoist_jobs::Enqueuer;
use hoist_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub manager: ContainerManager,
    pub enqueuer: Enqueuer,
    pub events: EventEmitter,
    /// Attempts given to jobs queued through the API.
    pub retry_policy: u32,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/deployments",
            get(handlers::list_deployments).post(handlers::save_deployment),
        )
        .route(
            "/deployments/{name}",
            get(handlers::get_deployment).delete(handlers::delete_deployment),
        )
        .route("/deployments/{name}/deploy", post(handlers::deploy))
        .route("/deployments/{name}/teardown", post(handlers::teardown))
        .route("/deployments/{name}/containers", get(handlers::list_containers))
        .route(
            "/deployments/{name}/secrets",
            get(handlers::list_secrets).post(handlers::add_secret),
        )
        .route(
            "/deployments/{name}/secrets/{key}",
            delete(handlers::delete_secret),
        )
        .route("/deployments/{name}/events", get(ws::events))
        .route("/activity", get(handlers::activity))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
