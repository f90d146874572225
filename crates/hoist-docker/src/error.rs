//! Container lifecycle error types.

use hoist_core::ContainerState;
use thiserror::Error;

/// Result type alias for Docker operations.
pub type DockerResult<T> = Result<T, DockerError>;

#[derive(Debug, Error)]
pub enum DockerError {
    /// The Docker daemon rejected or failed a request.
    #[error("docker error: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("container {id} is unhealthy (last state: {state})")]
    Unhealthy { id: String, state: ContainerState },

    #[error("state store error: {0}")]
    State(#[from] hoist_state::StateError),
}
