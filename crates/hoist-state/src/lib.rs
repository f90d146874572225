//! hoist-state: embedded state store for Hoist.
//!
//! Backed by [redb](https://docs.rs/redb). The store is a set of named
//! collections (one redb table each) mapping `&str` keys to JSON bytes.
//! Typed accessors on top of it persist deployment configs, per-deployment
//! secrets, and the job activity log.
//!
//! # Collections
//!
//! | Collection | Key | Value |
//! |---|---|---|
//! | `deployments` | deployment name | `DeploymentConfig` |
//! | `{name}-secrets` | secret key | `Secret` |
//! | `activity` | `{rfc3339 completion time}#{job id}` | `ActivityRecord` |
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod activity;
pub mod deployments;
pub mod error;
pub mod secrets;
pub mod store;
pub mod tables;

pub use activity::ActivityRecord;
pub use error::{StateError, StateResult};
pub use store::StateStore;
