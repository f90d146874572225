//! In-memory [`DockerApi`] for tests.
//!
//! Behaves like a single Docker engine with no images to fetch: pulls
//! succeed instantly, containers move between states on the usual calls.
//! A few knobs inject failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hoist_core::{Container, ContainerState, DEPLOYMENT_LABEL};
use uuid::Uuid;

use crate::api::{ContainerSpec, DockerApi, Network};
use crate::error::{DockerError, DockerResult};

#[derive(Default)]
pub struct InMemoryDocker {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    containers: BTreeMap<String, (ContainerSpec, Container)>,
    networks: BTreeMap<String, Network>,
    pulled: Vec<String>,
    inspections: HashMap<String, u32>,
    failing_pulls: u32,
    failing_creates: u32,
    start_state: Option<ContainerState>,
}

impl InMemoryDocker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `n` image pulls.
    pub fn fail_next_pulls(&self, n: u32) {
        self.lock().failing_pulls = n;
    }

    /// Fail the next `n` container creates.
    pub fn fail_next_creates(&self, n: u32) {
        self.lock().failing_creates = n;
    }

    /// State containers enter when started (default `running`).
    pub fn start_into(&self, state: ContainerState) {
        self.lock().start_state = Some(state);
    }

    /// Force a container into `state`, e.g. to simulate a crash.
    pub fn set_state(&self, id: &str, state: ContainerState) {
        if let Some((_, container)) = self.lock().containers.get_mut(id) {
            container.state = state;
        }
    }

    /// Image references pulled so far, in order.
    pub fn pulled(&self) -> Vec<String> {
        self.lock().pulled.clone()
    }

    /// The create request a container was built from.
    pub fn spec_of(&self, id: &str) -> Option<ContainerSpec> {
        self.lock().containers.get(id).map(|(spec, _)| spec.clone())
    }

    pub fn containers(&self) -> Vec<Container> {
        self.lock().containers.values().map(|(_, c)| c.clone()).collect()
    }

    pub fn network_count(&self) -> usize {
        self.lock().networks.len()
    }

    pub fn inspections(&self, id: &str) -> u32 {
        self.lock().inspections.get(id).copied().unwrap_or(0)
    }
}

fn not_found(what: &str, id: &str) -> DockerError {
    DockerError::NotFound(format!("no such {what}: {id}"))
}

#[async_trait]
impl DockerApi for InMemoryDocker {
    async fn pull_image(&self, reference: &str) -> DockerResult<()> {
        let mut state = self.lock();
        if state.failing_pulls > 0 {
            state.failing_pulls -= 1;
            return Err(DockerError::Api(format!("pull access denied for {reference}")));
        }
        state.pulled.push(reference.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> DockerResult<String> {
        let mut state = self.lock();
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(DockerError::Api(format!("cannot create {}", spec.name)));
        }
        if state.containers.values().any(|(s, _)| s.name == spec.name) {
            return Err(DockerError::Api(format!(
                "conflict: container name {} already in use",
                spec.name
            )));
        }

        let id = Uuid::new_v4().simple().to_string();
        let container = Container {
            id: id.clone(),
            name: spec.name.clone(),
            deployment: spec.labels.get(DEPLOYMENT_LABEL).cloned().unwrap_or_default(),
            network_id: None,
            image_id: format!("sha256:{}", spec.image),
            created_at: Some(Utc::now()),
            state: ContainerState::Created,
            ports: spec.ports.keys().map(|p| format!("{p}/tcp")).collect(),
            volumes: spec
                .binds
                .iter()
                .filter_map(|b| b.split_once(':').map(|(_, target)| target.to_string()))
                .collect(),
            command: Vec::new(),
            entrypoint: Vec::new(),
            labels: spec.labels.clone(),
        };
        state.containers.insert(id.clone(), (spec.clone(), container));
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> DockerResult<()> {
        let mut state = self.lock();
        let target = state.start_state.unwrap_or(ContainerState::Running);
        let (_, container) = state
            .containers
            .get_mut(id)
            .ok_or_else(|| not_found("container", id))?;
        container.state = target;
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout: Duration) -> DockerResult<()> {
        let mut state = self.lock();
        let (_, container) = state
            .containers
            .get_mut(id)
            .ok_or_else(|| not_found("container", id))?;
        container.state = ContainerState::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> DockerResult<()> {
        let mut state = self.lock();
        let running = state
            .containers
            .get(id)
            .map(|(_, c)| c.is_running())
            .ok_or_else(|| not_found("container", id))?;
        if running && !force {
            return Err(DockerError::Api(format!(
                "cannot remove running container {id}"
            )));
        }
        state.containers.remove(id);
        Ok(())
    }

    async fn list_containers(&self, label: &str, value: &str) -> DockerResult<Vec<Container>> {
        Ok(self
            .lock()
            .containers
            .values()
            .filter(|(_, c)| c.labels.get(label).map(String::as_str) == Some(value))
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> DockerResult<Container> {
        let mut state = self.lock();
        *state.inspections.entry(id.to_string()).or_default() += 1;
        state
            .containers
            .get(id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| not_found("container", id))
    }

    async fn network_by_name(&self, name: &str) -> DockerResult<Option<Network>> {
        Ok(self.lock().networks.get(name).cloned())
    }

    async fn create_network(&self, name: &str) -> DockerResult<Network> {
        let network = Network {
            id: format!("net-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
        };
        self.lock().networks.insert(name.to_string(), network.clone());
        Ok(network)
    }

    async fn connect_to_network(&self, network_id: &str, container_id: &str) -> DockerResult<()> {
        let mut state = self.lock();
        if !state.networks.values().any(|n| n.id == network_id) {
            return Err(not_found("network", network_id));
        }
        let (_, container) = state
            .containers
            .get_mut(container_id)
            .ok_or_else(|| not_found("container", container_id))?;
        container.network_id = Some(network_id.to_string());
        Ok(())
    }
}
