//! Event sinks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{EventError, EventResult};
use crate::event::Event;

/// A client receiving one deployment's events.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver one event. An error unsubscribes the client.
    async fn send(&self, event: &Event) -> EventResult<()>;

    /// Called once when the client is unsubscribed.
    async fn close(&self) {}
}

/// Subscriber that forwards events into a bounded channel.
///
/// The WebSocket endpoint pairs one of these with a socket loop draining
/// the receiver. Delivery never waits: a full buffer is a delivery error,
/// so a reader that stops draining gets unsubscribed.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Event>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn send(&self, event: &Event) -> EventResult<()> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => EventError::Delivery("subscriber buffer full".into()),
            TrySendError::Closed(_) => EventError::Closed,
        })
    }
}
