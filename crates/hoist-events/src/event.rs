use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EventResult;

/// Where in a job's life an event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Started,
    Step,
    Retrying,
    Failed,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Started => "started",
            Phase::Step => "step",
            Phase::Retrying => "retrying",
            Phase::Failed => "failed",
            Phase::Completed => "completed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress message. The timestamp stays in-process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub job_id: Uuid,
    pub phase: Phase,
    pub message: String,
    #[serde(skip, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(job_id: Uuid, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            job_id,
            phase,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// The wire form: `{"job_id", "phase", "message"}`.
    pub fn to_json(&self) -> EventResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
