//! Wiring: one store, one Docker client, one queue, and the tasks around them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hoist_api::ApiState;
use hoist_core::HoistConfig;
use hoist_docker::{BollardDocker, ContainerManager, DockerApi, HealthCheckPolicy};
use hoist_events::EventEmitter;
use hoist_jobs::{DeploymentExecutor, Enqueuer, WorkerPool};
use hoist_scheduler::Reconciler;
use hoist_state::StateStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

const DB_FILE: &str = "hoist.redb";

/// Every long-lived piece of a running daemon.
pub struct Daemon {
    config: HoistConfig,
    store: StateStore,
    manager: ContainerManager,
    enqueuer: Enqueuer,
    events: EventEmitter,
    pool: WorkerPool,
}

impl Daemon {
    /// Open the store under `data_dir` and assemble the subsystems around
    /// `docker`. Nothing is started yet.
    pub fn build(config: HoistConfig, docker: Arc<dyn DockerApi>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.server.data_dir)?;
        let db_path = config.server.data_dir.join(DB_FILE);
        let store = StateStore::open(&db_path)?;
        info!(path = %db_path.display(), "state store opened");

        let manager = ContainerManager::new(docker, store.clone())
            .with_network(config.docker.network.clone())
            .with_health_policy(HealthCheckPolicy::from(&config.health));

        let events = EventEmitter::new();
        let (enqueuer, receiver) = hoist_jobs::bounded(config.jobs.queue_capacity);
        let executor = Arc::new(DeploymentExecutor::new(manager.clone(), events.clone()));
        let pool = WorkerPool::new(config.jobs.workers, receiver, executor)
            .with_retry_delay(config.jobs.retry_delay())
            .with_events(events.clone())
            .with_activity_log(store.clone());

        Ok(Self {
            config,
            store,
            manager,
            enqueuer,
            events,
            pool,
        })
    }

    pub fn router(&self) -> Router {
        hoist_api::build_router(ApiState {
            store: self.store.clone(),
            manager: self.manager.clone(),
            enqueuer: self.enqueuer.clone(),
            events: self.events.clone(),
            retry_policy: self.config.jobs.deployment_retry_policy(),
        })
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Spawn the reconciler if watching is enabled.
    fn spawn_reconciler(&self, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        if !self.config.scheduler.watch {
            return None;
        }
        let reconciler = Reconciler::new(
            self.store.clone(),
            self.manager.clone(),
            self.enqueuer.clone(),
            self.config.scheduler.poll_interval(),
        )
        .with_retry_policy(self.config.jobs.deployment_retry_policy());
        Some(tokio::spawn(async move { reconciler.run(shutdown).await }))
    }
}

/// Run the daemon until Ctrl-C.
pub async fn serve(config: HoistConfig) -> anyhow::Result<()> {
    let docker = Arc::new(BollardDocker::connect()?);
    info!("docker client connected");

    let daemon = Daemon::build(config, docker)?;
    let network = daemon.manager.ensure_network().await?;
    info!(network = %network.name, "container network ready");

    daemon.pool().start().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler_handle = daemon.spawn_reconciler(shutdown_rx);

    let addr = SocketAddr::from(([0, 0, 0, 0], daemon.config.server.port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, daemon.router()).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "could not listen for Ctrl-C");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
    server.await?;

    if let Some(handle) = reconciler_handle {
        let _ = handle.await;
    }
    daemon.pool().stop().await;

    info!("hoist daemon stopped");
    Ok(())
}
