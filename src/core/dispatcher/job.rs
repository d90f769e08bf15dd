//! Units of work executed by the dispatcher

use crate::domain::errors::DispatcherError;
use crate::domain::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline-bounded context a job runs under
///
/// The token is a child of the job's parent context and is cancelled once the
/// job finishes, so anything spawned from it does not outlive the job.
#[derive(Debug, Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Instant,
}

impl JobContext {
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Same token with a deadline `reserve` earlier, leaving time for follow-up work
    pub fn with_reserve(&self, reserve: Duration) -> Self {
        let deadline = self
            .deadline
            .checked_sub(reserve)
            .unwrap_or(self.deadline)
            .max(Instant::now());
        Self {
            token: self.token.clone(),
            deadline,
        }
    }

    /// Runs `fut` until it completes, the deadline passes or the token is cancelled
    ///
    /// # Errors
    ///
    /// Returns `DispatcherError::DeadlineExceeded` or `DispatcherError::Cancelled`
    /// when `fut` did not finish in time.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let budget = self.remaining();
        tokio::select! {
            out = fut => Ok(out),
            _ = tokio::time::sleep_until(self.deadline) => {
                Err(DispatcherError::DeadlineExceeded(budget).into())
            }
            _ = self.token.cancelled() => Err(DispatcherError::Cancelled.into()),
        }
    }
}

/// Work performed by a dispatcher worker
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// URL or other label identifying the job in logs
    fn target(&self) -> &str;

    async fn handle(&self, ctx: &JobContext) -> Result<()>;
}

/// One submission to the dispatcher
///
/// The deadline is computed when a worker picks the job up, not when it is
/// created.
#[derive(Clone)]
pub struct Job {
    pub context: CancellationToken,
    pub duration: Duration,
    pub handler: Arc<dyn JobHandler>,
}

impl Job {
    pub fn new(context: CancellationToken, duration: Duration, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            context,
            duration,
            handler,
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("target", &self.handler.target())
            .field("duration", &self.duration)
            .finish()
    }
}
