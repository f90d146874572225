//! Workflow: an ordered pipeline of named async steps over one `&mut A`.
//!
//! Steps run strictly in the order they were added. The first step that
//! fails (or panics) aborts the pipeline; later steps never run.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::{StepError, WorkflowError, WorkflowResult};

pub type StepResult = Result<(), StepError>;

type Step<A> = Box<dyn for<'a> Fn(&'a mut A) -> BoxFuture<'a, StepResult> + Send + Sync>;

/// Notified before each step runs.
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn on_step(&self, workflow: &str, step: &str);
}

#[async_trait]
impl StepObserver for () {
    async fn on_step(&self, _workflow: &str, _step: &str) {}
}

pub struct Workflow<A> {
    name: String,
    steps: Vec<(String, Step<A>)>,
}

impl<A: Send> Workflow<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn with<F>(mut self, name: impl Into<String>, step: F) -> Self
    where
        F: for<'a> Fn(&'a mut A) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
    {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub async fn run(&self, args: &mut A) -> WorkflowResult<()> {
        self.run_observed(args, &()).await
    }

    /// Run every step, telling `observer` before each one starts.
    pub async fn run_observed(
        &self,
        args: &mut A,
        observer: &dyn StepObserver,
    ) -> WorkflowResult<()> {
        for (step_name, step) in &self.steps {
            observer.on_step(&self.name, step_name).await;
            debug!(workflow = %self.name, step = %step_name, "running step");

            // A step may panic while building its future or while polling it.
            let reborrowed: &mut A = &mut *args;
            let started = std::panic::catch_unwind(AssertUnwindSafe(move || {
                let args = reborrowed;
                step(args)
            }));
            let outcome = match started {
                Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                Err(panic) => Err(panic),
            };

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(source)) => {
                    return Err(WorkflowError::StepFailed {
                        workflow: self.name.clone(),
                        step: step_name.clone(),
                        source,
                    });
                }
                Err(panic) => {
                    return Err(WorkflowError::StepPanicked {
                        workflow: self.name.clone(),
                        step: step_name.clone(),
                        message: panic_message(panic.as_ref()),
                    });
                }
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Trace {
        ran: Vec<&'static str>,
    }

    fn record(
        name: &'static str,
    ) -> impl for<'a> Fn(&'a mut Trace) -> BoxFuture<'a, StepResult> + Send + Sync + 'static {
        move |trace| {
            Box::pin(async move {
                trace.ran.push(name);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn steps_run_in_order() {
        let workflow = Workflow::new("ordered")
            .with("s1", record("s1"))
            .with("s2", record("s2"))
            .with("s3", record("s3"));

        let mut trace = Trace::default();
        workflow.run(&mut trace).await.unwrap();
        assert_eq!(trace.ran, vec!["s1", "s2", "s3"]);
        assert_eq!(workflow.step_names(), vec!["s1", "s2", "s3"]);
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let workflow = Workflow::new("abort")
            .with("s1", record("s1"))
            .with("s2", |trace: &mut Trace| {
                Box::pin(async move {
                    trace.ran.push("s2");
                    Err::<(), StepError>("image not found".into())
                })
            })
            .with("s3", record("s3"));

        let mut trace = Trace::default();
        let err = workflow.run(&mut trace).await.unwrap_err();
        assert_eq!(err.step(), "s2");
        assert!(matches!(err, WorkflowError::StepFailed { .. }));
        assert!(err.to_string().contains("image not found"));
        assert_eq!(trace.ran, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn empty_workflow_succeeds() {
        let workflow: Workflow<Trace> = Workflow::new("empty");
        workflow.run(&mut Trace::default()).await.unwrap();
    }

    #[tokio::test]
    async fn panicking_step_becomes_an_error() {
        let workflow = Workflow::new("panics")
            .with("boom", |trace: &mut Trace| {
                Box::pin(async move {
                    if trace.ran.is_empty() {
                        panic!("step exploded");
                    }
                    Ok(())
                })
            })
            .with("after", record("after"));

        let mut trace = Trace::default();
        match workflow.run(&mut trace).await {
            Err(WorkflowError::StepPanicked { step, message, .. }) => {
                assert_eq!(step, "boom");
                assert_eq!(message, "step exploded");
            }
            other => panic!("expected StepPanicked, got {other:?}"),
        }
        assert!(trace.ran.is_empty());
    }

    #[tokio::test]
    async fn observer_sees_each_step() {
        #[derive(Default)]
        struct Seen(Mutex<Vec<String>>);

        #[async_trait]
        impl StepObserver for Seen {
            async fn on_step(&self, workflow: &str, step: &str) {
                self.0.lock().unwrap().push(format!("{workflow}/{step}"));
            }
        }

        let workflow = Workflow::new("create")
            .with("pull", record("pull"))
            .with("start", record("start"));
        let seen = Seen::default();
        workflow.run_observed(&mut Trace::default(), &seen).await.unwrap();
        assert_eq!(*seen.0.lock().unwrap(), vec!["create/pull", "create/start"]);
    }
}
