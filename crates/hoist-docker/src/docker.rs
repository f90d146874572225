//! Docker Engine client backed by bollard.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, EndpointSettings, HostConfig, PortBinding};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use hoist_core::{Container, ContainerState, DEPLOYMENT_LABEL};
use tracing::{debug, info};

use crate::api::{ContainerSpec, DockerApi, Network};
use crate::error::{DockerError, DockerResult};

/// [`DockerApi`] over the local Docker socket.
#[derive(Clone)]
pub struct BollardDocker {
    docker: Docker,
}

impl BollardDocker {
    /// Connect using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> DockerResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(api_err)?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn api_err(e: bollard::errors::Error) -> DockerError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => DockerError::NotFound(message),
        other => DockerError::Api(other.to_string()),
    }
}

#[async_trait]
impl DockerApi for BollardDocker {
    async fn pull_image(&self, reference: &str) -> DockerResult<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            let info = item.map_err(api_err)?;
            if let Some(status) = info.status {
                debug!(image = %reference, %status, "pull progress");
            }
        }
        info!(image = %reference, "image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> DockerResult<String> {
        let exposed_ports = spec
            .ports
            .keys()
            .map(|port| (format!("{port}/tcp"), HashMap::new()))
            .collect();

        let port_bindings = spec
            .ports
            .iter()
            .map(|(container, host)| {
                (
                    format!("{container}/tcp"),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(host.to_string()),
                    }]),
                )
            })
            .collect();

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            binds: if spec.binds.is_empty() {
                None
            } else {
                Some(spec.binds.clone())
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(api_err)?;
        debug!(name = %spec.name, id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> DockerResult<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(api_err)
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> DockerResult<()> {
        let options = StopContainerOptions {
            t: timeout.as_secs() as i64,
        };
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(api_err(e)),
        }
    }

    async fn remove_container(&self, id: &str, force: bool) -> DockerResult<()> {
        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(api_err)
    }

    async fn list_containers(&self, label: &str, value: &str) -> DockerResult<Vec<Container>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{label}={value}")]);
        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(api_err)?;

        let mut containers = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|s| s.id) {
            match self.inspect_container(&id).await {
                Ok(container) => containers.push(container),
                // Removed between list and inspect.
                Err(DockerError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(containers)
    }

    async fn inspect_container(&self, id: &str) -> DockerResult<Container> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(api_err)?;
        Ok(container_from_inspect(response))
    }

    async fn network_by_name(&self, name: &str) -> DockerResult<Option<Network>> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(network) => Ok(network.id.map(|id| Network {
                id,
                name: network.name.unwrap_or_else(|| name.to_string()),
            })),
            Err(e) => match api_err(e) {
                DockerError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_network(&self, name: &str) -> DockerResult<Network> {
        let options = CreateNetworkOptions {
            name: name.to_string(),
            driver: "bridge".to_string(),
            ..Default::default()
        };
        self.docker.create_network(options).await.map_err(api_err)?;
        info!(network = %name, "network created");
        self.network_by_name(name)
            .await?
            .ok_or_else(|| DockerError::NotFound(format!("network {name}")))
    }

    async fn connect_to_network(&self, network_id: &str, container_id: &str) -> DockerResult<()> {
        let options = ConnectNetworkOptions {
            container: container_id.to_string(),
            endpoint_config: EndpointSettings::default(),
        };
        self.docker
            .connect_network(network_id, options)
            .await
            .map_err(api_err)
    }
}

/// Map an inspect response into Hoist's container model.
fn container_from_inspect(response: ContainerInspectResponse) -> Container {
    let config = response.config.unwrap_or_default();
    let labels: BTreeMap<String, String> =
        config.labels.unwrap_or_default().into_iter().collect();

    let state = response
        .state
        .as_ref()
        .map(|s| {
            let status = s
                .status
                .as_ref()
                .and_then(|st| st.to_string().parse::<ContainerState>().ok())
                .unwrap_or(ContainerState::Created);
            if s.oom_killed == Some(true) && status != ContainerState::Running {
                ContainerState::OomKilled
            } else {
                status
            }
        })
        .unwrap_or(ContainerState::Created);

    let network_id = response
        .network_settings
        .and_then(|n| n.networks)
        .and_then(|networks| networks.values().find_map(|e| e.network_id.clone()));

    let mut ports: Vec<String> = config
        .exposed_ports
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default();
    ports.sort();

    Container {
        id: response.id.unwrap_or_default(),
        name: response
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        deployment: labels.get(DEPLOYMENT_LABEL).cloned().unwrap_or_default(),
        network_id,
        image_id: response.image.unwrap_or_default(),
        created_at: response
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|d| d.with_timezone(&Utc)),
        state,
        ports,
        volumes: response
            .mounts
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.destination)
            .collect(),
        command: config.cmd.unwrap_or_default(),
        entrypoint: config.entrypoint.unwrap_or_default(),
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerConfig, ContainerState as DockerState, ContainerStateStatusEnum};

    fn inspect(status: ContainerStateStatusEnum, oom: bool) -> ContainerInspectResponse {
        let mut labels = HashMap::new();
        labels.insert(DEPLOYMENT_LABEL.to_string(), "api".to_string());
        ContainerInspectResponse {
            id: Some("abc123".to_string()),
            name: Some("/api-1a2b3c4d".to_string()),
            image: Some("sha256:feed".to_string()),
            created: Some("2026-03-01T12:00:00.000000000Z".to_string()),
            state: Some(DockerState {
                status: Some(status),
                oom_killed: Some(oom),
                ..Default::default()
            }),
            config: Some(ContainerConfig {
                labels: Some(labels),
                cmd: Some(vec!["nginx".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn maps_inspect_response() {
        let container = container_from_inspect(inspect(ContainerStateStatusEnum::RUNNING, false));
        assert_eq!(container.id, "abc123");
        assert_eq!(container.name, "api-1a2b3c4d");
        assert_eq!(container.deployment, "api");
        assert_eq!(container.state, ContainerState::Running);
        assert_eq!(container.command, vec!["nginx".to_string()]);
        assert!(container.created_at.is_some());
    }

    #[test]
    fn oom_killed_overrides_exited() {
        let container = container_from_inspect(inspect(ContainerStateStatusEnum::EXITED, true));
        assert_eq!(container.state, ContainerState::OomKilled);
    }

    #[test]
    fn not_found_maps_from_404() {
        let err = api_err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such container".to_string(),
        });
        assert!(matches!(err, DockerError::NotFound(_)));
    }
}
