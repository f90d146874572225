//! Deployment config persistence.

use hoist_core::DeploymentConfig;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::tables::DEPLOYMENTS;

impl StateStore {
    /// Apply defaults, validate, and write a deployment config.
    ///
    /// Invalid configs are rejected before anything is written. Returns the
    /// config as stored.
    pub fn save_deployment(&self, mut config: DeploymentConfig) -> StateResult<DeploymentConfig> {
        config.apply_defaults();
        config.validate()?;
        self.put_json(DEPLOYMENTS, &config.name, &config)?;
        debug!(deployment = %config.name, "deployment stored");
        Ok(config)
    }

    /// Get a deployment by name.
    pub fn get_deployment(&self, name: &str) -> StateResult<DeploymentConfig> {
        self.get_json(DEPLOYMENTS, name)?
            .ok_or_else(|| StateError::NotFound(format!("deployment {name}")))
    }

    /// Get a deployment by name, `None` if absent.
    pub fn find_deployment(&self, name: &str) -> StateResult<Option<DeploymentConfig>> {
        self.get_json(DEPLOYMENTS, name)
    }

    /// List all deployments in name order.
    pub fn list_deployments(&self) -> StateResult<Vec<DeploymentConfig>> {
        self.get_all_json(DEPLOYMENTS)
    }

    /// Delete a deployment config. Returns true if it existed.
    ///
    /// Running containers are untouched; issue a delete job first.
    pub fn delete_deployment(&self, name: &str) -> StateResult<bool> {
        let existed = self.remove(DEPLOYMENTS, name)?;
        debug!(deployment = %name, existed, "deployment deleted");
        Ok(existed)
    }
}
