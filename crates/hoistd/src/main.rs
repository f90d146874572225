//! hoistd: the Hoist daemon.
//!
//! Single binary that assembles every Hoist subsystem:
//! - State store (redb)
//! - Docker client and container manager
//! - Job queue + worker pool
//! - Reconciler (with `--watch`)
//! - REST API + event streams
//!
//! # Usage
//!
//! ```text
//! hoistd serve --port 8420 --data-dir /var/lib/hoist --watch
//! ```

mod cli;
mod daemon;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

const DEFAULT_FILTER: &str = "info,hoistd=debug,hoist=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Serve(args) => {
            let config = args.load()?;
            daemon::serve(config).await
        }
        Command::PrintConfig(args) => {
            print!("{}", args.load()?.to_toml_string()?);
            Ok(())
        }
    }
}
