//! ContainerManager: translates deployments into Docker operations.
//!
//! Every container it creates carries the deployment label, joins the
//! orchestrator bridge network, and receives the deployment's secrets as
//! environment variables.

use std::sync::Arc;
use std::time::Duration;

use hoist_core::config::HealthConfig;
use hoist_core::{Container, ContainerState, DEPLOYMENT_LABEL, DeploymentConfig};
use hoist_state::{StateError, StateStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ContainerSpec, DockerApi, Network};
use crate::error::{DockerError, DockerResult};
use crate::labels;

/// Grace period before a stopping container is killed.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bridge network name.
pub const DEFAULT_NETWORK: &str = "hoist";

/// How long [`ContainerManager::health_check`] waits for containers to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    /// Inspections per container before giving up.
    pub retries: u32,
    /// Sleep after failed attempt `n` is `n × backoff_base`.
    pub backoff_base: Duration,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff_base: Duration::from_secs(10),
        }
    }
}

impl From<&HealthConfig> for HealthCheckPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            retries: config.retries,
            backoff_base: config.backoff_base(),
        }
    }
}

#[derive(Clone)]
pub struct ContainerManager {
    docker: Arc<dyn DockerApi>,
    store: StateStore,
    network: String,
    health: HealthCheckPolicy,
}

impl ContainerManager {
    pub fn new(docker: Arc<dyn DockerApi>, store: StateStore) -> Self {
        Self {
            docker,
            store,
            network: DEFAULT_NETWORK.to_string(),
            health: HealthCheckPolicy::default(),
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn with_health_policy(mut self, health: HealthCheckPolicy) -> Self {
        self.health = health;
        self
    }

    pub fn health_policy(&self) -> HealthCheckPolicy {
        self.health
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Look up the orchestrator network, creating it on first use.
    pub async fn ensure_network(&self) -> DockerResult<Network> {
        if let Some(network) = self.docker.network_by_name(&self.network).await? {
            return Ok(network);
        }
        self.docker.create_network(&self.network).await
    }

    /// Create (but do not start) one container for `config`.
    pub async fn create(&self, config: &DeploymentConfig) -> DockerResult<Container> {
        let network = self.ensure_network().await?;
        let spec = self.container_spec(config)?;

        let id = self.docker.create_container(&spec).await?;
        self.docker.connect_to_network(&network.id, &id).await?;
        info!(deployment = %config.name, container = %spec.name, %id, "container created");

        self.docker.inspect_container(&id).await
    }

    pub async fn pull_image(&self, config: &DeploymentConfig) -> DockerResult<()> {
        let reference = config.image_reference();
        debug!(deployment = %config.name, image = %reference, "pulling image");
        self.docker.pull_image(&reference).await
    }

    pub async fn start(&self, id: &str) -> DockerResult<()> {
        self.docker.start_container(id).await?;
        debug!(container = %id, "container started");
        Ok(())
    }

    pub async fn stop(&self, id: &str) -> DockerResult<()> {
        self.docker.stop_container(id, STOP_TIMEOUT).await?;
        debug!(container = %id, "container stopped");
        Ok(())
    }

    /// Remove a container together with its anonymous volumes.
    pub async fn remove(&self, id: &str, force: bool) -> DockerResult<()> {
        self.docker.remove_container(id, force).await?;
        debug!(container = %id, force, "container removed");
        Ok(())
    }

    pub async fn inspect(&self, id: &str) -> DockerResult<Container> {
        self.docker.inspect_container(id).await
    }

    /// Every container labelled for `deployment`, in any state.
    pub async fn list_by_deployment(&self, deployment: &str) -> DockerResult<Vec<Container>> {
        self.docker.list_containers(DEPLOYMENT_LABEL, deployment).await
    }

    /// Wait for every container to reach `running`.
    ///
    /// Each container gets up to `retries` inspections; after failed
    /// attempt `n` the check sleeps `n × backoff_base`.
    pub async fn health_check(&self, containers: &[Container], retries: u32) -> DockerResult<()> {
        let retries = retries.max(1);
        for container in containers {
            let mut attempt = 1;
            loop {
                let current = self.docker.inspect_container(&container.id).await?;
                if current.state == ContainerState::Running {
                    debug!(container = %container.id, attempt, "container healthy");
                    break;
                }
                if attempt >= retries {
                    warn!(container = %container.id, state = %current.state, "health check exhausted");
                    return Err(DockerError::Unhealthy {
                        id: container.id.clone(),
                        state: current.state,
                    });
                }
                let backoff = self.health.backoff_base * attempt;
                debug!(
                    container = %container.id,
                    state = %current.state,
                    attempt,
                    ?backoff,
                    "container not running yet"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
        Ok(())
    }

    /// Build the create request for one replica of `config`.
    pub fn container_spec(&self, config: &DeploymentConfig) -> DockerResult<ContainerSpec> {
        Ok(ContainerSpec {
            name: container_name(&config.name),
            image: config.image_reference(),
            env: self.resolve_env(config)?,
            labels: labels::container_labels(config, &self.network),
            ports: config.ports.clone(),
            binds: config
                .volumes
                .iter()
                .map(|(source, target)| format!("{source}:{target}"))
                .collect(),
        })
    }

    /// Environment entries: plain env (with secret aliases substituted)
    /// followed by one `NAME=value` entry per resolved secret.
    fn resolve_env(&self, config: &DeploymentConfig) -> DockerResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(config.secrets.len());
        for (key, alias) in &config.secrets {
            match self.store.get_secret(&config.name, key) {
                Ok(secret) => resolved.push((alias.clone(), secret)),
                Err(StateError::NotFound(_)) => {
                    warn!(deployment = %config.name, %key, "secret not found, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut env: Vec<String> = config
            .env
            .iter()
            .map(|(name, value)| {
                let value = resolved
                    .iter()
                    .find(|(alias, _)| alias == value)
                    .map(|(_, secret)| secret.value.as_str())
                    .unwrap_or(value.as_str());
                format!("{name}={value}")
            })
            .collect();

        env.extend(
            resolved
                .iter()
                .map(|(_, secret)| format!("{}={}", secret.env_name(), secret.value)),
        );
        Ok(env)
    }
}

/// `{deployment}-{8 hex chars}`.
pub fn container_name(deployment: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{deployment}-{}", &id[..8])
}
