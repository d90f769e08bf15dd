//! Fixed-size worker pool with blocking admission

use super::job::{Job, JobContext};
use crate::core::metrics::PipelineMetrics;
use crate::domain::errors::{DispatcherError, LanternError};
use crate::domain::Result;
use crate::log_job_failure;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A job in transit plus the pickup acknowledgement its submitter waits on
type Handoff = (Job, oneshot::Sender<()>);

struct Running {
    ctx: CancellationToken,
    jobs: mpsc::Sender<Handoff>,
    workers: Vec<JoinHandle<()>>,
}

/// Pool of `n` workers sharing one job handoff
///
/// [`add`](Self::add) returns only once a worker has taken the job, so at
/// most `n` jobs run at once and a submitter waits while every worker is
/// busy. [`stop`](Self::stop) closes the handoff: workers finish every job
/// already handed to them, including those of `add` calls still waiting,
/// and then exit. The pool can be started again afterwards.
pub struct JobDispatcher {
    running: Mutex<Option<Running>>,
    metrics: Arc<PipelineMetrics>,
}

impl JobDispatcher {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            running: Mutex::new(None),
            metrics,
        }
    }

    /// Spawns `num_workers` workers bound to `ctx`
    ///
    /// # Errors
    ///
    /// Returns `DispatcherError::AlreadyStarted` if a pool is running.
    pub async fn start(&self, ctx: CancellationToken, num_workers: usize) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(DispatcherError::AlreadyStarted.into());
        }
        if num_workers == 0 {
            return Err(LanternError::Validation(
                "worker count must be greater than zero".to_string(),
            ));
        }

        let (job_tx, job_rx) = mpsc::channel::<Handoff>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..num_workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    ctx.clone(),
                    Arc::clone(&job_rx),
                    Arc::clone(&self.metrics),
                ))
            })
            .collect();

        tracing::info!(num_workers, "Started query workers");

        *running = Some(Running {
            ctx,
            jobs: job_tx,
            workers,
        });
        Ok(())
    }

    /// Hands `job` to the next free worker, waiting while all are busy
    ///
    /// `Ok` means a worker has taken the job. The context check and the
    /// handoff are not atomic: a job taken just as the pool is cancelled
    /// still reaches a worker, which then observes the cancellation itself.
    ///
    /// # Errors
    ///
    /// Returns `DispatcherError::Cancelled` if the pool context has ended,
    /// before or during the wait, and `DispatcherError::NotRunning` if the
    /// pool is not running.
    pub async fn add(&self, job: Job) -> Result<()> {
        let (ctx, jobs) = {
            let running = self.running.lock().await;
            match running.as_ref() {
                Some(r) => (r.ctx.clone(), r.jobs.clone()),
                None => return Err(DispatcherError::NotRunning.into()),
            }
        };

        if ctx.is_cancelled() {
            return Err(DispatcherError::Cancelled.into());
        }

        let (taken_tx, taken_rx) = oneshot::channel();
        let handoff = async move {
            jobs.send((job, taken_tx)).await.ok()?;
            taken_rx.await.ok()
        };

        tokio::select! {
            biased;
            taken = handoff => {
                taken.ok_or(DispatcherError::Cancelled)?;
            }
            _ = ctx.cancelled() => return Err(DispatcherError::Cancelled.into()),
        }

        self.metrics.record_job_submitted();
        Ok(())
    }

    /// Stops every worker and waits for them to exit
    ///
    /// New submissions are refused from here on. Jobs whose `add` is already
    /// waiting are still taken and run before the workers exit. When the pool
    /// context is already cancelled the workers are unwinding on their own.
    ///
    /// # Errors
    ///
    /// Returns `DispatcherError::NotRunning` if no pool is running.
    pub async fn stop(&self) -> Result<()> {
        let Running { jobs, workers, .. } = self
            .running
            .lock()
            .await
            .take()
            .ok_or(DispatcherError::NotRunning)?;

        // Workers see the handoff close once every pending `add` has finished
        drop(jobs);

        let count = workers.len();
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Query worker panicked");
            }
        }

        tracing::info!(num_workers = count, "Stopped query workers");
        Ok(())
    }

    /// True while a pool is running
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn worker(
    id: usize,
    ctx: CancellationToken,
    jobs: Arc<Mutex<mpsc::Receiver<Handoff>>>,
    metrics: Arc<PipelineMetrics>,
) {
    loop {
        let (job, taken) = tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            next = async { jobs.lock().await.recv().await } => match next {
                Some(handoff) => handoff,
                None => break,
            },
        };
        if taken.send(()).is_err() {
            // The submitter gave up before the handoff completed
            tracing::debug!(worker = id, url = %job.handler.target(), "Dropped abandoned query job");
            continue;
        }
        run_job(job, &metrics).await;
    }
    tracing::debug!(worker = id, "Query worker exited");
}

async fn run_job(job: Job, metrics: &PipelineMetrics) {
    let token = job.context.child_token();
    let ctx = JobContext::new(token.clone(), Instant::now() + job.duration);

    let outcome = tokio::select! {
        res = job.handler.handle(&ctx) => res,
        _ = tokio::time::sleep_until(ctx.deadline()) => {
            Err(DispatcherError::DeadlineExceeded(job.duration).into())
        }
        _ = token.cancelled() => Err(DispatcherError::Cancelled.into()),
    };
    token.cancel();

    match outcome {
        Ok(()) => metrics.record_job_completed(),
        Err(LanternError::Dispatcher(DispatcherError::DeadlineExceeded(d))) => {
            metrics.record_job_timed_out();
            tracing::warn!(url = %job.handler.target(), budget = ?d, "Query job ran past its deadline");
        }
        Err(e) => {
            metrics.record_job_failed();
            log_job_failure!(job.handler.target(), e);
        }
    }
}
