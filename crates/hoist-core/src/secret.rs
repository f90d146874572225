//! Deployment-scoped secrets.
//!
//! A secret's alias is derived from its key (`api-token` → `@API_TOKEN`)
//! and is how configs reference it. Values leave the process only through
//! [`Secret::redact`]ed copies.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Placeholder written over values on every external read path.
pub const REDACTED: &str = "[REDACTED]";

const MIN_KEY_LEN: usize = 2;
const MAX_KEY_LEN: usize = 50;

static KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*[A-Za-z0-9]$").expect("valid secret key regex")
});

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    pub key: String,
    pub value: String,
    pub alias: String,
}

impl Secret {
    /// Validate the key and derive the alias.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> ValidationResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self {
            alias: alias_for(&key),
            key,
            value: value.into(),
        })
    }

    /// Replace the value with [`REDACTED`].
    pub fn redact(&mut self) {
        self.value = REDACTED.to_string();
    }

    pub fn redacted(mut self) -> Self {
        self.redact();
        self
    }

    /// Environment variable name the secret is injected under.
    pub fn env_name(&self) -> &str {
        self.alias.trim_start_matches('@')
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("key", &self.key)
            .field("value", &REDACTED)
            .field("alias", &self.alias)
            .finish()
    }
}

/// `aPi_ToKeN-1337` → `@API_TOKEN_1337`.
pub fn alias_for(key: &str) -> String {
    format!("@{}", key.to_uppercase().replace('-', "_"))
}

pub fn validate_key(key: &str) -> ValidationResult<()> {
    let len = key.len();
    if !(MIN_KEY_LEN..=MAX_KEY_LEN).contains(&len) || !KEY_PATTERN.is_match(key) {
        return Err(ValidationError::InvalidSecretKey(key.to_string()));
    }
    Ok(())
}

/// Store collection holding a deployment's secrets.
pub fn collection_name(deployment: &str) -> String {
    format!("{deployment}-secrets").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_derivation() {
        assert_eq!(alias_for("token"), "@TOKEN");
        assert_eq!(alias_for("api-token"), "@API_TOKEN");
        assert_eq!(alias_for("8080-API-PORT"), "@8080_API_PORT");
        assert_eq!(alias_for("aPi_ToKeN-1337"), "@API_TOKEN_1337");
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("ab").is_ok());
        assert!(validate_key("api-token").is_ok());
        assert!(validate_key("a").is_err());
        assert!(validate_key("-token").is_err());
        assert!(validate_key("token_").is_err());
        assert!(validate_key("to ken").is_err());
        assert!(validate_key(&"k".repeat(51)).is_err());
    }

    #[test]
    fn redact_replaces_value() {
        let secret = Secret::new("db-password", "hunter2").unwrap();
        let redacted = secret.clone().redacted();
        assert_eq!(redacted.value, REDACTED);
        assert_ne!(redacted.value, secret.value);
        assert_eq!(redacted.alias, "@DB_PASSWORD");
    }

    #[test]
    fn debug_never_prints_value() {
        let secret = Secret::new("token", "s3cr3t").unwrap();
        assert!(!format!("{secret:?}").contains("s3cr3t"));
    }

    #[test]
    fn env_name_strips_marker() {
        let secret = Secret::new("api-token", "x").unwrap();
        assert_eq!(secret.env_name(), "API_TOKEN");
    }

    #[test]
    fn collection_is_lowercase() {
        assert_eq!(collection_name("Api"), "api-secrets");
    }
}
