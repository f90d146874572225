//! hoist-docker: container lifecycle for Hoist.
//!
//! Translates a [`DeploymentConfig`](hoist_core::DeploymentConfig) plus its
//! resolved secrets into Docker operations, and maps Docker's container
//! representation back into [`hoist_core::Container`].
//!
//! # Architecture
//!
//! ```text
//! ContainerManager
//!   ├── DockerApi (trait) ── BollardDocker (Docker Engine over the local socket)
//!   │                     └─ InMemoryDocker (feature `test-util`)
//!   ├── StateStore (secret resolution)
//!   └── proxy labels (Traefik routing for aliases)
//! ```
//!
//! Container state is never cached: every query goes to Docker.

pub mod api;
pub mod docker;
pub mod error;
pub mod labels;
pub mod manager;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use api::{ContainerSpec, DockerApi, Network};
pub use docker::BollardDocker;
pub use error::{DockerError, DockerResult};
pub use manager::{ContainerManager, HealthCheckPolicy, STOP_TIMEOUT};

#[cfg(any(test, feature = "test-util"))]
pub use fake::InMemoryDocker;
