//! Deployment configuration: the desired state of one application.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Registry used when a config does not name one.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag used when a config does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Longest deployment name accepted.
pub const MAX_NAME_LEN: usize = 50;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]*[0-9a-z]$").expect("valid name regex"));

/// Desired state for one named application.
///
/// The name is the primary key in the store and the value of the
/// deployment label on every container created for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub tag: String,
    /// Desired number of running replicas.
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Container port → host port.
    #[serde(default)]
    pub ports: BTreeMap<u16, u16>,
    /// Host path or named volume → container path.
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Secret key → alias (`@KEY`).
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    /// Routing hostnames.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Serve aliases over TLS only.
    #[serde(default)]
    pub secure: bool,
    /// Attach the rate-limit middleware to the routes.
    #[serde(default)]
    pub rate_limit: bool,
}

fn default_scale() -> u32 {
    1
}

impl DeploymentConfig {
    /// A config with only the required fields set; defaults fill the rest.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        let mut config = Self {
            name: name.into(),
            image: image.into(),
            registry: String::new(),
            tag: String::new(),
            scale: default_scale(),
            ports: BTreeMap::new(),
            volumes: BTreeMap::new(),
            env: BTreeMap::new(),
            secrets: BTreeMap::new(),
            aliases: Vec::new(),
            secure: false,
            rate_limit: false,
        };
        config.apply_defaults();
        config
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Fill in registry, tag, and a minimum scale of one.
    pub fn apply_defaults(&mut self) {
        if self.registry.trim().is_empty() {
            self.registry = DEFAULT_REGISTRY.to_string();
        }
        if self.tag.trim().is_empty() {
            self.tag = DEFAULT_TAG.to_string();
        }
        if self.scale == 0 {
            self.scale = default_scale();
        }
    }

    /// Check the name pattern and that an image is set.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        if self.image.trim().is_empty() {
            return Err(ValidationError::MissingImage(self.name.clone()));
        }
        Ok(())
    }

    /// The reference passed to `docker pull` and used as the container image.
    ///
    /// Docker Hub images are referenced without the registry host.
    pub fn image_reference(&self) -> String {
        let tag = if self.tag.is_empty() { DEFAULT_TAG } else { &self.tag };
        if self.registry.is_empty() || self.registry == DEFAULT_REGISTRY {
            format!("{}:{}", self.image, tag)
        } else {
            format!("{}/{}:{}", self.registry.trim_end_matches('/'), self.image, tag)
        }
    }
}

/// Check a deployment name against the naming rules.
pub fn validate_name(name: &str) -> ValidationResult<()> {
    if name.len() > MAX_NAME_LEN || !NAME_PATTERN.is_match(name) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn is_valid_name(name: &str) -> bool {
    validate_name(name).is_ok()
}
