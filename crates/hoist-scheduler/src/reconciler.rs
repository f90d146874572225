//! Reconciler: desired vs. running replicas, on a timer.

use std::time::Duration;

use hoist_core::DeploymentConfig;
use hoist_docker::ContainerManager;
use hoist_jobs::{Enqueuer, Job, JobError};
use hoist_state::StateStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::SchedulerResult;

/// What one poll did, by deployment name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// A corrective create job was queued.
    pub enqueued: Vec<String>,
    /// Already at or above scale.
    pub satisfied: Vec<String>,
    /// Skipped: a job for the deployment is queued or running, or the
    /// queue was full.
    pub skipped: Vec<String>,
    /// Containers could not be listed.
    pub failed: Vec<String>,
}

pub struct Reconciler {
    store: StateStore,
    manager: ContainerManager,
    enqueuer: Enqueuer,
    interval: Duration,
    retry_policy: u32,
}

impl Reconciler {
    pub fn new(
        store: StateStore,
        manager: ContainerManager,
        enqueuer: Enqueuer,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            enqueuer,
            interval,
            retry_policy: 1,
        }
    }

    /// Attempts given to each corrective job.
    pub fn with_retry_policy(mut self, retry_policy: u32) -> Self {
        self.retry_policy = retry_policy.max(1);
        self
    }

    /// Poll immediately, then once per interval until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "reconciler started");

        loop {
            if let Err(e) = self.poll().await {
                error!(error = %e, "reconciliation poll failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("reconciler shutting down");
                    break;
                }
            }
        }
    }

    /// One pass over every saved deployment.
    pub async fn poll(&self) -> SchedulerResult<PollReport> {
        let mut report = PollReport::default();
        for config in self.store.list_deployments()? {
            let name = config.name.clone();
            if self.enqueuer.is_in_flight(&name) {
                debug!(deployment = %name, "job in flight, skipping");
                report.skipped.push(name);
                continue;
            }
            match self.reconcile(config).await {
                Ok(Outcome::Enqueued) => report.enqueued.push(name),
                Ok(Outcome::Satisfied) => report.satisfied.push(name),
                Ok(Outcome::QueueFull) => report.skipped.push(name),
                Err(e) => {
                    warn!(deployment = %name, error = %e, "could not reconcile deployment");
                    report.failed.push(name);
                }
            }
        }
        Ok(report)
    }

    async fn reconcile(&self, config: DeploymentConfig) -> SchedulerResult<Outcome> {
        let containers = self.manager.list_by_deployment(&config.name).await?;
        let running = containers.iter().filter(|c| c.is_running()).count();
        let scale = config.scale as usize;

        if running >= scale {
            debug!(deployment = %config.name, running, scale, "deployment at scale");
            return Ok(Outcome::Satisfied);
        }

        let name = config.name.clone();
        match self.enqueuer.try_enqueue(Job::create(config, self.retry_policy)) {
            Ok(job_id) => {
                info!(deployment = %name, running, scale, %job_id, "drift detected, redeploying");
                Ok(Outcome::Enqueued)
            }
            Err(JobError::QueueFull) => {
                warn!(deployment = %name, "job queue full, will retry next poll");
                Ok(Outcome::QueueFull)
            }
            Err(e) => Err(e.into()),
        }
    }
}

enum Outcome {
    Enqueued,
    Satisfied,
    QueueFull,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hoist_core::ContainerState;
    use hoist_docker::InMemoryDocker;
    use hoist_jobs::{JobKind, JobReceiver, bounded};

    use super::*;

    struct Fixture {
        docker: Arc<InMemoryDocker>,
        store: StateStore,
        manager: ContainerManager,
        receiver: JobReceiver,
        reconciler: Reconciler,
    }

    fn fixture(capacity: usize) -> Fixture {
        let docker = Arc::new(InMemoryDocker::new());
        let store = StateStore::open_in_memory().unwrap();
        let manager = ContainerManager::new(docker.clone(), store.clone());
        let (enqueuer, receiver) = bounded(capacity);
        let reconciler = Reconciler::new(
            store.clone(),
            manager.clone(),
            enqueuer,
            Duration::from_secs(30),
        )
        .with_retry_policy(2);
        Fixture {
            docker,
            store,
            manager,
            receiver,
            reconciler,
        }
    }

    async fn running_replica(f: &Fixture, config: &DeploymentConfig) -> String {
        let container = f.manager.create(config).await.unwrap();
        f.manager.start(&container.id).await.unwrap();
        container.id
    }

    #[tokio::test]
    async fn shortfall_enqueues_create_job() {
        let f = fixture(4);
        f.store
            .save_deployment(DeploymentConfig::new("api", "nginx").with_scale(2))
            .unwrap();

        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.enqueued, vec!["api".to_string()]);

        let job = f.receiver.recv().await.unwrap();
        assert_eq!(job.namespace, "api");
        assert_eq!(job.kind(), JobKind::Create);
        assert_eq!(job.retry_policy, 2);
    }

    #[tokio::test]
    async fn at_scale_is_left_alone() {
        let f = fixture(4);
        let config = f
            .store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();
        running_replica(&f, &config).await;

        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.satisfied, vec!["api".to_string()]);
        assert!(report.enqueued.is_empty());
    }

    #[tokio::test]
    async fn surplus_is_left_alone() {
        let f = fixture(4);
        let config = f
            .store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();
        running_replica(&f, &config).await;
        running_replica(&f, &config).await;

        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.satisfied, vec!["api".to_string()]);
    }

    #[tokio::test]
    async fn dead_containers_count_as_missing() {
        let f = fixture(4);
        let config = f
            .store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();
        let id = running_replica(&f, &config).await;
        f.docker.set_state(&id, ContainerState::OomKilled);

        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.enqueued, vec!["api".to_string()]);
    }

    #[tokio::test]
    async fn in_flight_deployments_are_skipped() {
        let f = fixture(4);
        f.store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();

        assert_eq!(f.reconciler.poll().await.unwrap().enqueued.len(), 1);
        // The first job is still queued.
        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.skipped, vec!["api".to_string()]);
        assert!(report.enqueued.is_empty());
    }

    #[tokio::test]
    async fn full_queue_is_not_an_error() {
        let f = fixture(1);
        f.store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();
        f.store
            .save_deployment(DeploymentConfig::new("web", "nginx"))
            .unwrap();

        let report = f.reconciler.poll().await.unwrap();
        assert_eq!(report.enqueued, vec!["api".to_string()]);
        assert_eq!(report.skipped, vec!["web".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_first_and_stops_on_shutdown() {
        let f = fixture(4);
        f.store
            .save_deployment(DeploymentConfig::new("api", "nginx"))
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let Fixture {
            receiver,
            reconciler,
            ..
        } = f;
        let handle = tokio::spawn(async move { reconciler.run(rx).await });

        // The first poll happens before any sleep.
        let job = receiver.recv().await.unwrap();
        assert_eq!(job.namespace, "api");

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
