//! EventEmitter: deployment name → subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{Event, Phase};
use crate::subscriber::Subscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Subscribers = HashMap<String, HashMap<SubscriptionId, Arc<dyn Subscriber>>>;

/// Cheap to clone; clones share the subscriber map.
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Arc<RwLock<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(
        &self,
        deployment: &str,
        subscriber: Arc<dyn Subscriber>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .await
            .entry(deployment.to_string())
            .or_default()
            .insert(id, subscriber);
        debug!(%deployment, subscription = %id, "subscribed");
        id
    }

    /// Remove and close a subscriber. Returns false if it was not subscribed.
    pub async fn unsubscribe(&self, deployment: &str, id: SubscriptionId) -> bool {
        let removed = {
            let mut map = self.subscribers.write().await;
            let removed = map.get_mut(deployment).and_then(|subs| subs.remove(&id));
            if map.get(deployment).is_some_and(HashMap::is_empty) {
                map.remove(deployment);
            }
            removed
        };

        match removed {
            Some(subscriber) => {
                subscriber.close().await;
                debug!(%deployment, subscription = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    pub async fn subscriber_count(&self, deployment: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(deployment)
            .map_or(0, HashMap::len)
    }

    /// Deliver an event to every subscriber of `deployment`, one task each.
    ///
    /// Returns the number of deliveries started. A subscriber whose
    /// delivery fails is unsubscribed; the others are unaffected.
    ///
    /// Each delivery is its own task, so events emitted back to back may
    /// reach a subscriber in a different order.
    pub async fn emit(
        &self,
        job_id: Uuid,
        deployment: &str,
        phase: Phase,
        message: impl Into<String>,
    ) -> usize {
        let event = Arc::new(Event::new(job_id, phase, message));
        let targets: Vec<(SubscriptionId, Arc<dyn Subscriber>)> = {
            let map = self.subscribers.read().await;
            match map.get(deployment) {
                Some(subs) => subs.iter().map(|(id, s)| (*id, s.clone())).collect(),
                None => return 0,
            }
        };

        for (id, subscriber) in &targets {
            let emitter = self.clone();
            let event = event.clone();
            let deployment = deployment.to_string();
            let id = *id;
            let subscriber = subscriber.clone();
            tokio::spawn(async move {
                if let Err(e) = subscriber.send(&event).await {
                    warn!(%deployment, subscription = %id, error = %e, "event delivery failed");
                    emitter.unsubscribe(&deployment, id).await;
                }
            });
        }
        targets.len()
    }
}
