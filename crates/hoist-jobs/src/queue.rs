//! Bounded job queue.
//!
//! [`Enqueuer`] is the producer half (API handlers, the scheduler) and
//! [`JobReceiver`] the consumer half shared by every worker. The channel
//! is the only buffer: when it is full, `enqueue` waits.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{JobError, JobResult};
use crate::job::Job;
use crate::locks::InFlight;

/// Build a queue holding at most `capacity` waiting jobs.
pub fn bounded(capacity: usize) -> (Enqueuer, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let in_flight = InFlight::new();
    (
        Enqueuer {
            tx,
            in_flight: in_flight.clone(),
        },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
            in_flight,
        },
    )
}

#[derive(Clone)]
pub struct Enqueuer {
    tx: mpsc::Sender<Job>,
    in_flight: InFlight,
}

impl Enqueuer {
    /// Validate and queue a job, waiting while the queue is full.
    pub async fn enqueue(&self, job: Job) -> JobResult<Uuid> {
        job.validate()?;
        let (id, namespace) = (job.id, job.namespace.clone());

        // Only the wait for a slot is cancellable; nothing is tracked until
        // the slot is ours.
        let permit = self.tx.reserve().await.map_err(|_| JobError::QueueClosed)?;
        self.in_flight.acquire(&namespace);
        permit.send(job);
        debug!(job_id = %id, %namespace, "job enqueued");
        Ok(id)
    }

    /// Like [`enqueue`](Self::enqueue) but fails with `QueueFull` instead
    /// of waiting.
    pub fn try_enqueue(&self, job: Job) -> JobResult<Uuid> {
        job.validate()?;
        let (id, namespace) = (job.id, job.namespace.clone());

        self.in_flight.acquire(&namespace);
        match self.tx.try_send(job) {
            Ok(()) => {
                debug!(job_id = %id, %namespace, "job enqueued");
                Ok(id)
            }
            Err(e) => {
                self.in_flight.release(&namespace);
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => JobError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => JobError::QueueClosed,
                })
            }
        }
    }

    /// True while a job for `namespace` is queued or running.
    pub fn is_in_flight(&self, namespace: &str) -> bool {
        self.in_flight.contains(namespace)
    }

    /// Jobs waiting in the channel.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer half; clones share one receiver.
#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    in_flight: InFlight,
}

impl JobReceiver {
    /// Next job, or `None` once every [`Enqueuer`] is gone and the queue
    /// is drained.
    pub async fn recv(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }

    /// Mark a received job finished for in-flight tracking.
    pub fn finish(&self, job: &Job) {
        self.in_flight.release(&job.namespace);
    }
}
