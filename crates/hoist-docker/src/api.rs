//! The Docker collaborator boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use hoist_core::Container;

use crate::error::DockerResult;

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    /// Full image reference, e.g. `nginx:latest`.
    pub image: String,
    /// `KEY=value` entries.
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// Container port → host port (TCP).
    pub ports: BTreeMap<u16, u16>,
    /// `source:target` bind/volume strings.
    pub binds: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

/// Operations Hoist needs from a Docker engine.
///
/// Implementations map engine "no such object" responses to
/// [`DockerError::NotFound`](crate::DockerError::NotFound).
#[async_trait]
pub trait DockerApi: Send + Sync {
    /// Pull an image, waiting for the pull to finish.
    async fn pull_image(&self, reference: &str) -> DockerResult<()>;

    /// Create (but do not start) a container. Returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> DockerResult<String>;

    async fn start_container(&self, id: &str) -> DockerResult<()>;

    /// Stop with a grace period before the engine kills the container.
    async fn stop_container(&self, id: &str, timeout: Duration) -> DockerResult<()>;

    /// Remove a container and its anonymous volumes.
    async fn remove_container(&self, id: &str, force: bool) -> DockerResult<()>;

    /// All containers, in any state, carrying `label=value`.
    async fn list_containers(&self, label: &str, value: &str) -> DockerResult<Vec<Container>>;

    async fn inspect_container(&self, id: &str) -> DockerResult<Container>;

    async fn network_by_name(&self, name: &str) -> DockerResult<Option<Network>>;

    /// Create a bridge network.
    async fn create_network(&self, name: &str) -> DockerResult<Network>;

    async fn connect_to_network(&self, network_id: &str, container_id: &str) -> DockerResult<()>;
}
