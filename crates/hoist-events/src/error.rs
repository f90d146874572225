use thiserror::Error;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Debug, Error)]
pub enum EventError {
    /// The subscriber's transport went away.
    #[error("subscriber closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
