//! Scheduler error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("state store error: {0}")]
    State(#[from] hoist_state::StateError),

    #[error("docker error: {0}")]
    Docker(#[from] hoist_docker::DockerError),

    #[error("job error: {0}")]
    Job(#[from] hoist_jobs::JobError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
