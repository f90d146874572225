//! hoist-jobs: the deployment execution engine.
//!
//! # Architecture
//!
//! ```text
//! API / scheduler ──enqueue──► bounded queue ──► WorkerPool (N workers)
//!                                                   │
//!                                                   ├── NamespaceLocks (one job per deployment at a time)
//!                                                   ├── JobExecutor ── Workflow<CreateJobArgs | DeleteJobArgs>
//!                                                   ├── EventEmitter (progress)
//!                                                   └── activity log
//! ```
//!
//! `enqueue` waits while the queue is full; that wait is the only
//! backpressure between producers and workers.

pub mod error;
pub mod executor;
pub mod job;
pub mod locks;
pub mod queue;
pub mod worker;
pub mod workflow;

pub use error::{JobError, JobResult, StepError, WorkflowError, WorkflowResult};
pub use executor::{DeploymentExecutor, JobExecutor};
pub use job::{CreateJobArgs, DeleteJobArgs, Job, JobArgs, JobKind, JobOutcome, JobStatus};
pub use queue::{Enqueuer, JobReceiver, bounded};
pub use worker::WorkerPool;
pub use workflow::{StepObserver, StepResult, Workflow};
