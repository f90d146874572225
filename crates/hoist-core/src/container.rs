//! Runtime container model, derived on demand from Docker.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label carried by every container Hoist creates. Its value is the
/// owning deployment's name and is the only ownership mechanism.
pub const DEPLOYMENT_LABEL: &str = "hoist.deployment";

/// A container as seen through the Docker API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
    /// Owning deployment, from [`DEPLOYMENT_LABEL`].
    pub deployment: String,
    pub network_id: Option<String>,
    pub image_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub state: ContainerState,
    /// Exposed ports, e.g. `80/tcp`.
    pub ports: Vec<String>,
    /// Mount destinations inside the container.
    pub volumes: Vec<String>,
    pub command: Vec<String>,
    pub entrypoint: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl Container {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

/// Lifecycle state reported by Docker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Dead,
    OomKilled,
    Exited,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Dead => "dead",
            Self::OomKilled => "oom-killed",
            Self::Exited => "exited",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState(pub String);

impl fmt::Display for UnknownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown container state: {}", self.0)
    }
}

impl std::error::Error for UnknownState {}

impl FromStr for ContainerState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "restarting" => Ok(Self::Restarting),
            "removing" => Ok(Self::Removing),
            "dead" => Ok(Self::Dead),
            "oom-killed" | "oomkilled" => Ok(Self::OomKilled),
            "exited" => Ok(Self::Exited),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_display() {
        for state in [
            ContainerState::Created,
            ContainerState::Running,
            ContainerState::OomKilled,
            ContainerState::Exited,
        ] {
            assert_eq!(state.to_string().parse::<ContainerState>(), Ok(state));
        }
    }

    #[test]
    fn state_parse_is_case_insensitive() {
        assert_eq!("RUNNING".parse::<ContainerState>(), Ok(ContainerState::Running));
        assert!("sleeping".parse::<ContainerState>().is_err());
    }

    #[test]
    fn state_serializes_kebab_case() {
        let json = serde_json::to_string(&ContainerState::OomKilled).unwrap();
        assert_eq!(json, "\"oom-killed\"");
    }
}
