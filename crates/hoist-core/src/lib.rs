//! hoist-core: shared types for the Hoist orchestrator.
//!
//! Everything that more than one Hoist crate needs to agree on lives here:
//! the desired-state [`DeploymentConfig`], the runtime [`Container`] model
//! derived from Docker, deployment-scoped [`Secret`]s, validation rules,
//! and the daemon's [`HoistConfig`] file format.

pub mod config;
pub mod container;
pub mod deployment;
pub mod error;
pub mod secret;

pub use config::HoistConfig;
pub use container::{Container, ContainerState, DEPLOYMENT_LABEL};
pub use deployment::DeploymentConfig;
pub use error::{ValidationError, ValidationResult};
pub use secret::Secret;
