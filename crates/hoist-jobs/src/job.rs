//! Jobs: one unit of deployment work with its retry bookkeeping.

use std::fmt;

use chrono::{DateTime, Utc};
use hoist_core::{Container, DeploymentConfig, ValidationError, ValidationResult};
use hoist_state::ActivityRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Create,
    Delete,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Create => "create",
            JobKind::Delete => "delete",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state of the create workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJobArgs {
    pub config: DeploymentConfig,
    /// Containers that existed before this run; removed on success.
    pub current_containers: Vec<Container>,
    /// Containers created by this run.
    pub new_containers: Vec<Container>,
}

/// Shared state of the delete workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteJobArgs {
    pub config: DeploymentConfig,
    pub current_containers: Vec<Container>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobArgs {
    Create(CreateJobArgs),
    Delete(DeleteJobArgs),
}

impl JobArgs {
    pub fn kind(&self) -> JobKind {
        match self {
            JobArgs::Create(_) => JobKind::Create,
            JobArgs::Delete(_) => JobKind::Delete,
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        match self {
            JobArgs::Create(args) => &args.config,
            JobArgs::Delete(args) => &args.config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub execution_count: u32,
    pub failure_count: u32,
    /// One entry per failed attempt, oldest first.
    pub errors: Vec<String>,
    pub outcome: Option<JobOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Deployment name.
    pub namespace: String,
    pub args: JobArgs,
    /// Maximum attempts.
    pub retry_policy: u32,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(namespace: impl Into<String>, args: JobArgs, retry_policy: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.into(),
            args,
            retry_policy,
            status: JobStatus::default(),
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Deploy (or redeploy) `config`.
    pub fn create(config: DeploymentConfig, retry_policy: u32) -> Self {
        let namespace = config.name.clone();
        let args = JobArgs::Create(CreateJobArgs {
            config,
            current_containers: Vec::new(),
            new_containers: Vec::new(),
        });
        Self::new(namespace, args, retry_policy)
    }

    /// Tear down every container of `config`.
    pub fn delete(config: DeploymentConfig, retry_policy: u32) -> Self {
        let namespace = config.name.clone();
        let args = JobArgs::Delete(DeleteJobArgs {
            config,
            current_containers: Vec::new(),
        });
        Self::new(namespace, args, retry_policy)
    }

    /// Tear down every container labelled `name` when no saved config is
    /// left to build the job from.
    pub fn delete_orphaned(name: &str, retry_policy: u32) -> Self {
        Self::delete(DeploymentConfig::new(name, String::new()), retry_policy)
    }

    pub fn kind(&self) -> JobKind {
        self.args.kind()
    }

    pub fn config(&self) -> &DeploymentConfig {
        self.args.config()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::InvalidJob("empty namespace".into()));
        }
        if self.namespace != self.config().name {
            return Err(ValidationError::InvalidJob(format!(
                "namespace {:?} does not match deployment {:?}",
                self.namespace,
                self.config().name
            )));
        }
        if self.retry_policy < 1 {
            return Err(ValidationError::InvalidJob(
                "retry policy must allow at least one attempt".into(),
            ));
        }
        Ok(())
    }

    pub fn succeeded(&self) -> bool {
        self.status.outcome == Some(JobOutcome::Succeeded)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, error: String) {
        self.status.failure_count += 1;
        self.status.errors.push(error);
    }

    pub(crate) fn mark_completed(&mut self, outcome: JobOutcome) {
        self.status.outcome = Some(outcome);
        self.completed_at = Some(Utc::now());
    }

    /// Summary written to the activity log.
    pub fn activity_record(&self) -> ActivityRecord {
        ActivityRecord {
            job_id: self.id,
            namespace: self.namespace.clone(),
            kind: self.kind().to_string(),
            succeeded: self.succeeded(),
            execution_count: self.status.execution_count,
            failure_count: self.status.failure_count,
            errors: self.status.errors.clone(),
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            completed_at: self.completed_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_namespace_and_kind() {
        let job = Job::create(DeploymentConfig::new("api", "nginx"), 3);
        assert_eq!(job.namespace, "api");
        assert_eq!(job.kind(), JobKind::Create);
        assert_eq!(job.retry_policy, 3);
        assert!(job.validate().is_ok());

        let job = Job::delete(DeploymentConfig::new("api", "nginx"), 1);
        assert_eq!(job.kind(), JobKind::Delete);
    }

    #[test]
    fn ids_are_unique() {
        let config = DeploymentConfig::new("api", "nginx");
        assert_ne!(Job::create(config.clone(), 1).id, Job::create(config, 1).id);
    }

    #[test]
    fn validation_rules() {
        let config = DeploymentConfig::new("api", "nginx");

        let mut job = Job::create(config.clone(), 1);
        job.namespace = String::new();
        assert!(matches!(job.validate(), Err(ValidationError::InvalidJob(_))));

        let mut job = Job::create(config.clone(), 1);
        job.namespace = "web".into();
        assert!(job.validate().is_err());

        let job = Job::create(config, 0);
        assert!(job.validate().is_err());
    }

    #[test]
    fn activity_record_mirrors_status() {
        let mut job = Job::create(DeploymentConfig::new("api", "nginx"), 2);
        job.mark_started();
        job.status.execution_count = 2;
        job.record_failure("pull failed".into());
        job.record_failure("pull failed again".into());
        job.mark_completed(JobOutcome::Failed);

        let record = job.activity_record();
        assert_eq!(record.job_id, job.id);
        assert_eq!(record.kind, "create");
        assert!(!record.succeeded);
        assert_eq!(record.failure_count, 2);
        assert_eq!(record.errors, job.status.errors);
        assert_eq!(Some(record.completed_at), job.completed_at);
    }
}
