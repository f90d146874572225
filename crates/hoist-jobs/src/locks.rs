//! Per-deployment serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One async mutex per namespace. A worker holds its namespace's lock for
/// the whole job so two jobs for one deployment never interleave.
#[derive(Clone, Default)]
pub struct NamespaceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, namespace: &str) -> OwnedMutexGuard<()> {
        let lock = guard(&self.locks)
            .entry(namespace.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

/// Count of queued or running jobs per namespace.
#[derive(Clone, Default)]
pub struct InFlight {
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, namespace: &str) {
        *guard(&self.counts).entry(namespace.to_string()).or_default() += 1;
    }

    pub fn release(&self, namespace: &str) {
        let mut counts = guard(&self.counts);
        if let Some(count) = counts.get_mut(namespace) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(namespace);
            }
        }
    }

    pub fn contains(&self, namespace: &str) -> bool {
        guard(&self.counts).contains_key(namespace)
    }

    pub fn count(&self, namespace: &str) -> usize {
        guard(&self.counts).get(namespace).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn in_flight_counts_per_namespace() {
        let in_flight = InFlight::new();
        in_flight.acquire("api");
        in_flight.acquire("api");
        assert_eq!(in_flight.count("api"), 2);
        assert!(!in_flight.contains("web"));

        in_flight.release("api");
        assert!(in_flight.contains("api"));
        in_flight.release("api");
        assert!(!in_flight.contains("api"));

        in_flight.release("api");
        assert_eq!(in_flight.count("api"), 0);
    }

    #[tokio::test]
    async fn same_namespace_is_exclusive() {
        let locks = NamespaceLocks::new();
        let held = locks.lock("api").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("api").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // Other namespaces are independent.
        let _web = locks.lock("web").await;

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }
}
