//! hoist-events: workflow progress events for Hoist.
//!
//! Workers emit [`Event`]s keyed by deployment name; the [`EventEmitter`]
//! fans each one out to that deployment's subscribers. Delivery is
//! best-effort: every subscriber is written from its own task and a
//! subscriber whose write fails is dropped.

pub mod emitter;
pub mod error;
pub mod event;
pub mod subscriber;

pub use emitter::{EventEmitter, SubscriptionId};
pub use error::{EventError, EventResult};
pub use event::{Event, Phase};
pub use subscriber::{ChannelSubscriber, Subscriber};
