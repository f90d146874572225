//! Command line. Flags (or their `HOIST_*` variables) override `hoist.toml`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hoist_core::HoistConfig;

#[derive(Parser)]
#[command(name = "hoistd", about = "Hoist deployment daemon")]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "HOIST_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon: worker pool, optional reconciler, and the API.
    Serve(ServeArgs),
    /// Print the effective configuration as TOML and exit.
    PrintConfig(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Path to hoist.toml.
    #[arg(long, env = "HOIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// API port.
    #[arg(long, env = "HOIST_PORT")]
    pub port: Option<u16>,

    /// Directory holding hoist.redb.
    #[arg(long, env = "HOIST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Number of workers.
    #[arg(long, env = "HOIST_WORKERS")]
    pub workers: Option<usize>,

    /// Jobs buffered before enqueue waits.
    #[arg(long, env = "HOIST_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Attempts for deployment jobs.
    #[arg(long, env = "HOIST_DEPLOYMENT_RETRIES")]
    pub deployment_retries: Option<u32>,

    /// Delay between failed attempts, in milliseconds.
    #[arg(long, env = "HOIST_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    /// Run the reconciliation loop.
    #[arg(long, env = "HOIST_WATCH")]
    pub watch: bool,

    /// Reconciliation interval, in milliseconds.
    #[arg(long, env = "HOIST_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Bridge network for managed containers.
    #[arg(long, env = "HOIST_NETWORK")]
    pub network: Option<String>,
}

impl ServeArgs {
    /// Read the config file (if any), then apply flag overrides.
    pub fn load(&self) -> anyhow::Result<HoistConfig> {
        let mut config = match &self.config {
            Some(path) => HoistConfig::from_file(path)?,
            None => HoistConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut HoistConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.server.data_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.jobs.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.jobs.queue_capacity = capacity;
        }
        if let Some(retries) = self.deployment_retries {
            config.jobs.deployment_retries = retries;
        }
        if let Some(delay) = self.retry_delay_ms {
            config.jobs.retry_delay_ms = delay;
        }
        if self.watch {
            config.scheduler.watch = true;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.scheduler.poll_interval_ms = interval;
        }
        if let Some(network) = &self.network {
            config.docker.network = network.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Serve(args) => args,
            Command::PrintConfig(_) => panic!("expected serve"),
        }
    }

    #[test]
    fn no_flags_means_defaults() {
        let config = serve_args(&["hoistd", "serve"]).load().unwrap();
        assert_eq!(config, HoistConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hoist.toml");
        std::fs::write(&path, "[jobs]\nworkers = 4\nqueue_capacity = 10\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let config = serve_args(&[
            "hoistd",
            "serve",
            "--config",
            &path_arg,
            "--workers",
            "8",
            "--watch",
            "--network",
            "edge",
        ])
        .load()
        .unwrap();

        assert_eq!(config.jobs.workers, 8);
        assert_eq!(config.jobs.queue_capacity, 10);
        assert!(config.scheduler.watch);
        assert_eq!(config.docker.network, "edge");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = serve_args(&["hoistd", "serve", "--config", "/nonexistent/hoist.toml"]);
        assert!(args.load().is_err());
    }
}
