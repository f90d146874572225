//! Worker pool: N workers pulling jobs from one shared queue.
//!
//! A worker owns a dequeued job until it completes: it holds the job's
//! namespace lock, runs up to `retry_policy` attempts with a fixed delay
//! between them, records the outcome in the activity log, and emits
//! lifecycle events along the way.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hoist_events::{EventEmitter, Phase};
use hoist_state::StateStore;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::executor::JobExecutor;
use crate::job::{Job, JobOutcome};
use crate::locks::NamespaceLocks;
use crate::queue::JobReceiver;

/// Default pause between failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct WorkerContext {
    receiver: JobReceiver,
    executor: Arc<dyn JobExecutor>,
    events: EventEmitter,
    activity: Option<StateStore>,
    completed: Option<mpsc::UnboundedSender<Job>>,
    locks: NamespaceLocks,
    retry_delay: Duration,
}

pub struct WorkerPool {
    concurrency: usize,
    context: WorkerContext,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(concurrency: usize, receiver: JobReceiver, executor: Arc<dyn JobExecutor>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            concurrency: concurrency.max(1),
            context: WorkerContext {
                receiver,
                executor,
                events: EventEmitter::new(),
                activity: None,
                completed: None,
                locks: NamespaceLocks::new(),
                retry_delay: DEFAULT_RETRY_DELAY,
            },
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.context.retry_delay = delay;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.context.events = events;
        self
    }

    /// Record every finished job in the store's activity log.
    pub fn with_activity_log(mut self, store: StateStore) -> Self {
        self.context.activity = Some(store);
        self
    }

    /// Send every finished job, with its final status, to `tx`.
    pub fn with_completed_jobs(mut self, tx: mpsc::UnboundedSender<Job>) -> Self {
        self.context.completed = Some(tx);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Spawn the workers. Calling it again does nothing.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("worker pool already started");
            return;
        }

        let context = Arc::new(self.context.clone());
        let mut handles = self.handles.lock().await;
        for worker_id in 0..self.concurrency {
            let context = context.clone();
            let shutdown = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                run_worker(worker_id, context, shutdown).await;
            }));
        }
        info!(workers = self.concurrency, "worker pool started");
    }

    /// Signal every worker to exit after its current job and wait for all
    /// of them.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }
        info!("worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    context: Arc<WorkerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id, "worker starting");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = context.receiver.recv() => match job {
                Some(job) => job,
                None => {
                    debug!(worker_id, "job queue closed");
                    break;
                }
            },
        };
        context.process(worker_id, job).await;
    }
    debug!(worker_id, "worker exiting");
}

impl WorkerContext {
    async fn process(&self, worker_id: usize, mut job: Job) {
        let namespace = job.namespace.clone();
        let _lock = self.locks.lock(&namespace).await;

        job.mark_started();
        info!(worker_id, job_id = %job.id, %namespace, kind = %job.kind(), "job started");
        self.events
            .emit(job.id, &namespace, Phase::Started, job.kind().as_str())
            .await;

        let attempts = job.retry_policy.max(1);
        let mut outcome = JobOutcome::Failed;
        for attempt in 1..=attempts {
            job.status.execution_count += 1;
            match self.executor.execute(&mut job).await {
                Ok(()) => {
                    outcome = JobOutcome::Succeeded;
                    break;
                }
                Err(e) => {
                    let message = e.to_string();
                    job.record_failure(message.clone());
                    if attempt < attempts {
                        warn!(
                            job_id = %job.id,
                            %namespace,
                            attempt,
                            error = %message,
                            "job attempt failed, retrying"
                        );
                        self.events
                            .emit(job.id, &namespace, Phase::Retrying, message)
                            .await;
                        tokio::time::sleep(self.retry_delay).await;
                    } else {
                        error!(
                            job_id = %job.id,
                            %namespace,
                            attempts,
                            error = %message,
                            "job failed"
                        );
                    }
                }
            }
        }

        job.mark_completed(outcome);
        match outcome {
            JobOutcome::Succeeded => {
                info!(
                    job_id = %job.id,
                    %namespace,
                    executions = job.status.execution_count,
                    "job completed"
                );
                self.events
                    .emit(job.id, &namespace, Phase::Completed, job.kind().as_str())
                    .await;
            }
            JobOutcome::Failed => {
                let last = job.status.errors.last().cloned().unwrap_or_default();
                self.events
                    .emit(job.id, &namespace, Phase::Failed, last)
                    .await;
            }
        }

        if let Some(store) = &self.activity {
            if let Err(e) = store.record_activity(&job.activity_record()) {
                error!(job_id = %job.id, error = %e, "failed to record job activity");
            }
        }

        self.receiver.finish(&job);
        if let Some(tx) = &self.completed {
            let _ = tx.send(job);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use hoist_core::DeploymentConfig;
    use hoist_events::ChannelSubscriber;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::{JobError, JobResult, WorkflowError};
    use crate::queue;

    /// Fails the first `failures` attempts, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl JobExecutor for Flaky {
        async fn execute(&self, _job: &mut Job) -> JobResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(JobError::Workflow(WorkflowError::StepFailed {
                    workflow: "create".into(),
                    step: "pull-image".into(),
                    source: format!("registry unavailable (attempt {call})").into(),
                }));
            }
            Ok(())
        }
    }

    /// Blocks each job until a permit is released.
    struct Gated {
        gate: Arc<Semaphore>,
        started: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl JobExecutor for Gated {
        async fn execute(&self, job: &mut Job) -> JobResult<()> {
            let _ = self.started.send(job.namespace.clone());
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            Ok(())
        }
    }

    fn job(name: &str, retries: u32) -> Job {
        Job::create(DeploymentConfig::new(name, "nginx"), retries)
    }

    fn pool(
        capacity: usize,
        workers: usize,
        executor: Arc<dyn JobExecutor>,
    ) -> (queue::Enqueuer, WorkerPool, mpsc::UnboundedReceiver<Job>) {
        let (enqueuer, receiver) = queue::bounded(capacity);
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(workers, receiver, executor)
            .with_retry_delay(Duration::from_millis(1))
            .with_completed_jobs(tx);
        (enqueuer, pool, rx)
    }

    #[tokio::test]
    async fn successful_job_runs_once() {
        let (enqueuer, pool, mut done) = pool(4, 1, Flaky::new(0));
        pool.start().await;

        enqueuer.enqueue(job("api", 3)).await.unwrap();
        let job = done.recv().await.unwrap();

        assert!(job.succeeded());
        assert_eq!(job.status.execution_count, 1);
        assert_eq!(job.status.failure_count, 0);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
        pool.stop().await;
    }

    #[tokio::test]
    async fn exhausted_retries_count_every_attempt() {
        let executor = Flaky::new(u32::MAX);
        let (enqueuer, pool, mut done) = pool(4, 1, executor.clone());
        pool.start().await;

        enqueuer.enqueue(job("api", 3)).await.unwrap();
        let job = done.recv().await.unwrap();

        assert!(!job.succeeded());
        assert_eq!(job.status.outcome, Some(JobOutcome::Failed));
        assert_eq!(job.status.execution_count, 3);
        assert_eq!(job.status.failure_count, 3);
        assert_eq!(job.status.errors.len(), 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        pool.stop().await;
    }

    #[tokio::test]
    async fn retry_stops_at_first_success() {
        let (enqueuer, pool, mut done) = pool(4, 1, Flaky::new(2));
        pool.start().await;

        enqueuer.enqueue(job("api", 5)).await.unwrap();
        let job = done.recv().await.unwrap();

        assert!(job.succeeded());
        assert_eq!(job.status.execution_count, 3);
        assert_eq!(job.status.failure_count, 2);
        pool.stop().await;
    }

    #[tokio::test]
    async fn full_queue_makes_enqueue_wait() {
        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let executor = Arc::new(Gated {
            gate: gate.clone(),
            started: started_tx,
        });
        let (enqueuer, pool, mut done) = pool(1, 1, executor);
        pool.start().await;

        // Job 1 is taken by the only worker, which then blocks on the gate.
        enqueuer.enqueue(job("one", 1)).await.unwrap();
        assert_eq!(started.recv().await.unwrap(), "one");

        // Job 2 fills the single slot.
        enqueuer.enqueue(job("two", 1)).await.unwrap();

        // Job 3 must wait for a free slot.
        let third = {
            let enqueuer = enqueuer.clone();
            tokio::spawn(async move { enqueuer.enqueue(job("three", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!third.is_finished());

        // Completing job 1 lets the worker take job 2, freeing the slot.
        gate.add_permits(1);
        assert_eq!(done.recv().await.unwrap().namespace, "one");
        tokio::time::timeout(Duration::from_secs(1), third)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        gate.add_permits(2);
        assert_eq!(done.recv().await.unwrap().namespace, "two");
        assert_eq!(done.recv().await.unwrap().namespace, "three");
        pool.stop().await;
    }

    #[tokio::test]
    async fn jobs_for_one_namespace_do_not_overlap() {
        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let executor = Arc::new(Gated {
            gate: gate.clone(),
            started: started_tx,
        });
        let (enqueuer, pool, mut done) = pool(4, 2, executor);
        pool.start().await;

        enqueuer.enqueue(job("api", 1)).await.unwrap();
        enqueuer.enqueue(job("api", 1)).await.unwrap();
        assert_eq!(started.recv().await.unwrap(), "api");

        // The second worker holds the job but waits on the namespace lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.try_recv().is_err());

        gate.add_permits(2);
        done.recv().await.unwrap();
        done.recv().await.unwrap();
        assert!(!enqueuer.is_in_flight("api"));
        pool.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_joins_workers() {
        let (_enqueuer, pool, _done) = pool(1, 3, Flaky::new(0));
        pool.start().await;
        pool.start().await;
        assert_eq!(pool.handles.lock().await.len(), 3);

        tokio::time::timeout(Duration::from_secs(1), pool.stop())
            .await
            .unwrap();
        assert!(pool.handles.lock().await.is_empty());
    }

    #[tokio::test]
    async fn stop_waits_for_the_running_job() {
        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let executor = Arc::new(Gated {
            gate: gate.clone(),
            started: started_tx,
        });
        let (enqueuer, pool, mut done) = pool(2, 1, executor);
        pool.start().await;

        enqueuer.enqueue(job("api", 1)).await.unwrap();
        assert_eq!(started.recv().await.unwrap(), "api");

        let stopping = pool.stop();
        tokio::pin!(stopping);
        let early = tokio::time::timeout(Duration::from_millis(50), &mut stopping).await;
        assert!(early.is_err(), "stop returned while a job was running");

        gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(1), stopping)
            .await
            .unwrap();

        let job = done.try_recv().unwrap();
        assert_eq!(job.namespace, "api");
        assert!(job.succeeded());
        assert!(!enqueuer.is_in_flight("api"));
    }

    #[tokio::test]
    async fn lifecycle_events_and_activity() {
        let store = StateStore::open_in_memory().unwrap();
        let events = EventEmitter::new();
        let (subscriber, mut rx) = ChannelSubscriber::new(16);
        events.subscribe("api", Arc::new(subscriber)).await;

        let (enqueuer, receiver) = queue::bounded(2);
        let (tx, mut done) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(1, receiver, Flaky::new(1))
            .with_retry_delay(Duration::from_millis(1))
            .with_events(events)
            .with_activity_log(store.clone())
            .with_completed_jobs(tx);
        pool.start().await;

        let id = enqueuer.enqueue(job("api", 2)).await.unwrap();
        done.recv().await.unwrap();

        let mut phases = Vec::new();
        for _ in 0..3 {
            phases.push(rx.recv().await.unwrap().phase);
        }
        assert!(phases.contains(&Phase::Started));
        assert!(phases.contains(&Phase::Retrying));
        assert!(phases.contains(&Phase::Completed));

        let now = Utc::now();
        let records = store
            .activity_for("api", now - ChronoDuration::minutes(1), now)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].job_id, id);
        assert!(records[0].succeeded);
        assert_eq!(records[0].execution_count, 2);
        pool.stop().await;
    }
}
