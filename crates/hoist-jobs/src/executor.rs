//! Job executors: what a worker runs for one attempt of a job.

use async_trait::async_trait;
use hoist_core::ContainerState;
use hoist_docker::{ContainerManager, DockerError};
use hoist_events::{EventEmitter, Phase};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::JobResult;
use crate::job::{CreateJobArgs, DeleteJobArgs, Job, JobArgs};
use crate::workflow::{StepObserver, StepResult, Workflow};

/// Runs one attempt of a job. Retries are the worker's business.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &mut Job) -> JobResult<()>;
}

/// Runs the create and delete deployment workflows.
pub struct DeploymentExecutor {
    create: Workflow<CreateJobArgs>,
    delete: Workflow<DeleteJobArgs>,
    events: EventEmitter,
}

impl DeploymentExecutor {
    pub fn new(manager: ContainerManager, events: EventEmitter) -> Self {
        Self {
            create: create_workflow(&manager),
            delete: delete_workflow(&manager),
            events,
        }
    }
}

struct JobProgress<'a> {
    events: &'a EventEmitter,
    job_id: Uuid,
    deployment: &'a str,
}

#[async_trait]
impl StepObserver for JobProgress<'_> {
    async fn on_step(&self, _workflow: &str, step: &str) {
        self.events
            .emit(self.job_id, self.deployment, Phase::Step, step)
            .await;
    }
}

#[async_trait]
impl JobExecutor for DeploymentExecutor {
    async fn execute(&self, job: &mut Job) -> JobResult<()> {
        let progress = JobProgress {
            events: &self.events,
            job_id: job.id,
            deployment: &job.namespace,
        };
        match &mut job.args {
            JobArgs::Create(args) => self.create.run_observed(args, &progress).await?,
            JobArgs::Delete(args) => self.delete.run_observed(args, &progress).await?,
        }
        Ok(())
    }
}

/// fetch-current-containers → pull-image → create-containers →
/// start-containers → health-check → cleanup-old-containers
pub fn create_workflow(manager: &ContainerManager) -> Workflow<CreateJobArgs> {
    let (m1, m2, m3, m4, m5, m6) = (
        manager.clone(),
        manager.clone(),
        manager.clone(),
        manager.clone(),
        manager.clone(),
        manager.clone(),
    );
    Workflow::<CreateJobArgs>::new("create")
        .with("fetch-current-containers", move |args| {
            Box::pin(fetch_for_create(m1.clone(), args))
        })
        .with("pull-image", move |args| Box::pin(pull_image(m2.clone(), args)))
        .with("create-containers", move |args| {
            Box::pin(create_containers(m3.clone(), args))
        })
        .with("start-containers", move |args| {
            Box::pin(start_containers(m4.clone(), args))
        })
        .with("health-check", move |args| Box::pin(health_check(m5.clone(), args)))
        .with("cleanup-old-containers", move |args| {
            Box::pin(cleanup_old(m6.clone(), args))
        })
}

/// fetch-current-containers → stop-containers → remove-containers
pub fn delete_workflow(manager: &ContainerManager) -> Workflow<DeleteJobArgs> {
    let (m1, m2, m3) = (manager.clone(), manager.clone(), manager.clone());
    Workflow::<DeleteJobArgs>::new("delete")
        .with("fetch-current-containers", move |args| {
            Box::pin(fetch_for_delete(m1.clone(), args))
        })
        .with("stop-containers", move |args| {
            Box::pin(stop_containers(m2.clone(), args))
        })
        .with("remove-containers", move |args| {
            Box::pin(remove_containers(m3.clone(), args))
        })
}

async fn fetch_for_create(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    args.current_containers = manager.list_by_deployment(&args.config.name).await?;
    args.new_containers.clear();
    debug!(
        deployment = %args.config.name,
        current = args.current_containers.len(),
        "fetched current containers"
    );
    Ok(())
}

async fn pull_image(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    manager.pull_image(&args.config).await?;
    Ok(())
}

async fn create_containers(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    for _ in 0..args.config.scale {
        let container = manager.create(&args.config).await?;
        args.new_containers.push(container);
    }
    Ok(())
}

async fn start_containers(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    for container in &args.new_containers {
        manager.start(&container.id).await?;
    }
    Ok(())
}

async fn health_check(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    let retries = manager.health_policy().retries;
    manager.health_check(&args.new_containers, retries).await?;
    Ok(())
}

async fn cleanup_old(manager: ContainerManager, args: &mut CreateJobArgs) -> StepResult {
    for container in &args.current_containers {
        stop_if_running(&manager, &container.id, container.state).await?;
        remove_if_present(&manager, &container.id).await?;
    }
    info!(
        deployment = %args.config.name,
        replaced = args.current_containers.len(),
        running = args.new_containers.len(),
        "deployment rolled out"
    );
    Ok(())
}

async fn fetch_for_delete(manager: ContainerManager, args: &mut DeleteJobArgs) -> StepResult {
    args.current_containers = manager.list_by_deployment(&args.config.name).await?;
    Ok(())
}

async fn stop_containers(manager: ContainerManager, args: &mut DeleteJobArgs) -> StepResult {
    for container in &args.current_containers {
        stop_if_running(&manager, &container.id, container.state).await?;
    }
    Ok(())
}

async fn remove_containers(manager: ContainerManager, args: &mut DeleteJobArgs) -> StepResult {
    for container in &args.current_containers {
        remove_if_present(&manager, &container.id).await?;
    }
    info!(
        deployment = %args.config.name,
        removed = args.current_containers.len(),
        "deployment torn down"
    );
    Ok(())
}

async fn stop_if_running(
    manager: &ContainerManager,
    id: &str,
    state: ContainerState,
) -> Result<(), DockerError> {
    if state != ContainerState::Running {
        return Ok(());
    }
    match manager.stop(id).await {
        Err(DockerError::NotFound(_)) => Ok(()),
        other => other,
    }
}

async fn remove_if_present(manager: &ContainerManager, id: &str) -> Result<(), DockerError> {
    match manager.remove(id, true).await {
        Err(DockerError::NotFound(_)) => Ok(()),
        other => other,
    }
}
