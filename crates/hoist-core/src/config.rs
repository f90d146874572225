//! hoist.toml configuration parser.
//!
//! Every table and field is optional; missing values take the defaults
//! below. The daemon layers CLI flags and `HOIST_*` environment variables
//! on top of the parsed file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HoistConfig {
    pub jobs: JobsConfig,
    pub scheduler: SchedulerConfig,
    pub docker: DockerConfig,
    pub health: HealthConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Jobs buffered before `enqueue` starts waiting.
    pub queue_capacity: usize,
    /// Upper bound on attempts for any job.
    pub max_retries: u32,
    /// Attempts for create/delete deployment jobs.
    pub deployment_retries: u32,
    /// Fixed delay between failed attempts.
    pub retry_delay_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 32,
            max_retries: 5,
            deployment_retries: 3,
            retry_delay_ms: 5_000,
        }
    }
}

impl JobsConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Retry policy for deployment jobs, clamped to `1..=max_retries`.
    pub fn deployment_retry_policy(&self) -> u32 {
        self.deployment_retries.clamp(1, self.max_retries.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the reconciliation loop.
    pub watch: bool,
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watch: false,
            poll_interval_ms: 30_000,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DockerConfig {
    /// Bridge network every managed container joins.
    pub network: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            network: "hoist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Status polls per container before a deploy is declared unhealthy.
    pub retries: u32,
    /// Backoff before poll `n` is `n × backoff_base_ms`.
    pub backoff_base_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff_base_ms: 10_000,
        }
    }
}

impl HealthConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8420,
            data_dir: PathBuf::from("/var/lib/hoist"),
        }
    }
}

impl HoistConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HoistConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: HoistConfig = toml::from_str("").unwrap();
        assert_eq!(config, HoistConfig::default());
        assert_eq!(config.jobs.workers, 2);
        assert!(!config.scheduler.watch);
        assert_eq!(config.docker.network, "hoist");
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config: HoistConfig = toml::from_str(
            r#"
[jobs]
workers = 8

[scheduler]
watch = true
poll_interval_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(config.jobs.workers, 8);
        assert_eq!(config.jobs.queue_capacity, 32);
        assert!(config.scheduler.watch);
        assert_eq!(config.scheduler.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn deployment_retry_policy_is_clamped() {
        let jobs = JobsConfig {
            max_retries: 2,
            deployment_retries: 10,
            ..JobsConfig::default()
        };
        assert_eq!(jobs.deployment_retry_policy(), 2);

        let jobs = JobsConfig {
            deployment_retries: 0,
            ..JobsConfig::default()
        };
        assert_eq!(jobs.deployment_retry_policy(), 1);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = HoistConfig::default();
        let text = config.to_toml_string().unwrap();
        let parsed: HoistConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hoist.toml");
        std::fs::write(&path, "[docker]\nnetwork = \"edge\"\n").unwrap();
        let config = HoistConfig::from_file(&path).unwrap();
        assert_eq!(config.docker.network, "edge");
    }
}
