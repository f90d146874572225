//! Job engine error types.

use hoist_core::ValidationError;
use thiserror::Error;

/// Error a workflow step may return.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

pub type JobResult<T> = Result<T, JobError>;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Returned by non-blocking enqueue only; `enqueue` waits instead.
    #[error("job queue is full")]
    QueueFull,

    #[error("job queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {workflow}: step {step} failed: {source}")]
    StepFailed {
        workflow: String,
        step: String,
        #[source]
        source: StepError,
    },

    #[error("workflow {workflow}: step {step} panicked: {message}")]
    StepPanicked {
        workflow: String,
        step: String,
        message: String,
    },
}

impl WorkflowError {
    /// Name of the step that aborted the workflow.
    pub fn step(&self) -> &str {
        match self {
            WorkflowError::StepFailed { step, .. } | WorkflowError::StepPanicked { step, .. } => {
                step
            }
        }
    }
}
