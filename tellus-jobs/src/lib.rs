//! Asynchronous job orchestration for the tile pager.
//!
//! One synchronous driver thread owns the page tree; fetch/decode work runs
//! as independent tasks on the executor's worker pool. Completed outcomes are
//! marshalled back over a channel and drained by the driver at tick time, so
//! no task ever mutates driver-owned state concurrently.

use std::{any, future, panic::AssertUnwindSafe, pin};

use futures_util::FutureExt;

pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + Send + 'static>>;

pub trait Job: any::Any + Sized + Send + 'static {
    type Outcome: any::Any + Send + 'static;

    fn name(&self) -> String;

    /// Outcome reported when the task panics; panics never cross the task
    /// boundary.
    fn panic_outcome(&self) -> Self::Outcome;

    fn perform(self) -> AsyncReturn<Self::Outcome>;
}

/// Cancellation handle for an in-flight job. Aborting is fire-and-forget: a
/// cancelled task simply never delivers its outcome.
pub struct JobHandle {
    abort: tokio::task::AbortHandle,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

pub struct JobExecutor<O> {
    runtime: tokio::runtime::Runtime,
    outcome_tx: async_channel::Sender<O>,
    outcome_rx: async_channel::Receiver<O>,
}

impl<O: Send + 'static> JobExecutor<O> {
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .enable_time()
            .thread_name("tellus-job")
            .build()?;
        let (outcome_tx, outcome_rx) = async_channel::unbounded::<O>();
        Ok(Self {
            runtime,
            outcome_tx,
            outcome_rx,
        })
    }

    pub fn spawn<J: Job<Outcome = O>>(&self, job: J) -> JobHandle {
        let job_name = job.name();
        let panic_outcome = job.panic_outcome();
        let outcome_tx = self.outcome_tx.clone();

        let task = self.runtime.spawn(async move {
            let started = instant::Instant::now();
            let outcome = match AssertUnwindSafe(job.perform()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!("job '{}' panicked", job_name);
                    panic_outcome
                }
            };
            tracing::debug!("job '{}' finished in {:?}", job_name, started.elapsed());
            if let Err(e) = outcome_tx.send(outcome).await {
                tracing::error!(
                    "failed to send result from job '{}' back to driver: {:?}",
                    job_name,
                    e
                );
            }
        });

        JobHandle {
            abort: task.abort_handle(),
        }
    }

    /// Non-blocking outcome drain, called by the driver at tick start.
    pub fn try_take(&self) -> Option<O> {
        self.outcome_rx.try_recv().ok()
    }

    /// Block until one outcome arrives. Test helper; the driver never waits.
    pub fn take_blocking(&self) -> Option<O> {
        self.outcome_rx.recv_blocking().ok()
    }

    pub fn pending_outcomes(&self) -> usize {
        self.outcome_rx.len()
    }
}
