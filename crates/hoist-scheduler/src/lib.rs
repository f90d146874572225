//! hoist-scheduler: reconciliation loop.
//!
//! Every tick the [`Reconciler`] compares each saved deployment's `scale`
//! with the number of its containers actually running and enqueues a
//! create job for any deployment that falls short.
//!
//! ```text
//! Reconciler
//!   ├── StateStore (saved DeploymentConfigs)
//!   ├── ContainerManager (live containers per deployment)
//!   └── Enqueuer (non-blocking; skips deployments with work in flight)
//! ```

pub mod error;
pub mod reconciler;

pub use error::{SchedulerError, SchedulerResult};
pub use reconciler::{PollReport, Reconciler};
