//! Per-deployment secret persistence.
//!
//! Each deployment's secrets live in their own `{name}-secrets` collection,
//! keyed by secret key. Values are returned unredacted here; callers on an
//! external read path must redact.

use hoist_core::Secret;
use hoist_core::deployment::validate_name;
use hoist_core::secret::collection_name;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

impl StateStore {
    /// Add or replace a secret for a deployment.
    pub fn add_secret(&self, deployment: &str, key: &str, value: &str) -> StateResult<Secret> {
        validate_name(deployment)?;
        let secret = Secret::new(key, value)?;
        self.put_json(&collection_name(deployment), &secret.key, &secret)?;
        debug!(%deployment, alias = %secret.alias, "secret stored");
        Ok(secret)
    }

    pub fn get_secret(&self, deployment: &str, key: &str) -> StateResult<Secret> {
        self.get_json(&collection_name(deployment), key)?
            .ok_or_else(|| StateError::NotFound(format!("secret {key} for {deployment}")))
    }

    pub fn get_all_secrets(&self, deployment: &str) -> StateResult<Vec<Secret>> {
        self.get_all_json(&collection_name(deployment))
    }

    pub fn delete_secret(&self, deployment: &str, key: &str) -> StateResult<()> {
        if !self.remove(&collection_name(deployment), key)? {
            return Err(StateError::NotFound(format!("secret {key} for {deployment}")));
        }
        debug!(%deployment, %key, "secret deleted");
        Ok(())
    }

    /// Drop every secret of a deployment.
    pub fn delete_all_secrets(&self, deployment: &str) -> StateResult<bool> {
        self.delete_collection(&collection_name(deployment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::ValidationError;

    #[test]
    fn add_get_and_list() {
        let store = StateStore::open_in_memory().unwrap();
        let added = store.add_secret("api", "db-password", "hunter2").unwrap();
        assert_eq!(added.alias, "@DB_PASSWORD");

        assert_eq!(store.get_secret("api", "db-password").unwrap(), added);
        store.add_secret("api", "token", "t").unwrap();
        assert_eq!(store.get_all_secrets("api").unwrap().len(), 2);
    }

    #[test]
    fn secrets_are_scoped_per_deployment() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_secret("api", "token", "a").unwrap();
        store.add_secret("web", "token", "b").unwrap();

        assert_eq!(store.get_secret("api", "token").unwrap().value, "a");
        assert_eq!(store.get_secret("web", "token").unwrap().value, "b");
        assert!(store.get_all_secrets("worker").unwrap().is_empty());
    }

    #[test]
    fn invalid_key_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.add_secret("api", "-bad", "v").unwrap_err();
        assert!(matches!(
            err,
            StateError::Validation(ValidationError::InvalidSecretKey(_))
        ));
        assert!(store.get_all_secrets("api").unwrap().is_empty());
    }

    #[test]
    fn delete_secret() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_secret("api", "token", "v").unwrap();

        store.delete_secret("api", "token").unwrap();
        assert!(matches!(
            store.get_secret("api", "token"),
            Err(StateError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_secret("api", "token"),
            Err(StateError::NotFound(_))
        ));
    }

    #[test]
    fn delete_all_secrets_drops_collection() {
        let store = StateStore::open_in_memory().unwrap();
        store.add_secret("api", "one", "1").unwrap();
        store.add_secret("api", "two", "2").unwrap();

        assert!(store.delete_all_secrets("api").unwrap());
        assert!(store.get_all_secrets("api").unwrap().is_empty());
    }
}
