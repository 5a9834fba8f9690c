//! Worker pools that pull jobs from a queue and apply the retry policy.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::queue::error::JobError;
use crate::queue::job::{Envelope, Job, JobKind};
use crate::queue::memory::JobQueue;

/// Business logic for one or more job kinds.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one delivery. `attempt` is 1-based.
    async fn handle(&self, job: &Job, attempt: u32) -> Result<(), JobError>;

    /// Called once when a retryable failure has used up the attempt budget.
    async fn exhausted(&self, job: &Job, last_error: &JobError);
}

/// What happened to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Completed,
    Retry(Duration),
    Exhausted,
    /// Terminal failure; never redelivered.
    Failed,
}

impl Disposition {
    fn label(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::Retry(_) => "retry",
            Disposition::Exhausted => "exhausted",
            Disposition::Failed => "failed",
        }
    }
}

/// Run one delivery of `envelope` and decide its fate. The envelope's attempt count is advanced.
pub async fn dispatch(handler: &dyn JobHandler, envelope: &mut Envelope) -> Disposition {
    envelope.attempts_made += 1;
    let attempt = envelope.attempts_made;
    let kind = envelope.kind();
    let started = Instant::now();

    let disposition = match handler.handle(&envelope.job, attempt).await {
        Ok(()) => Disposition::Completed,
        Err(err) if err.is_retryable() && envelope.policy.allows_retry(attempt) => {
            let delay = envelope.policy.delay_after(attempt);
            tracing::info!(
                job_id = %envelope.id,
                queue = %kind,
                attempt,
                max_attempts = envelope.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Job will be retried"
            );
            Disposition::Retry(delay)
        }
        Err(err) if err.is_retryable() => {
            tracing::warn!(
                job_id = %envelope.id,
                queue = %kind,
                attempt,
                error = %err,
                "Job exhausted its attempts"
            );
            handler.exhausted(&envelope.job, &err).await;
            Disposition::Exhausted
        }
        Err(err) => {
            tracing::error!(
                job_id = %envelope.id,
                queue = %kind,
                attempt,
                reason = err.label(),
                error = %err,
                "Job failed terminally"
            );
            Disposition::Failed
        }
    };

    metrics::record_job(kind.name(), disposition.label(), started.elapsed());
    disposition
}

/// A fixed number of concurrent workers bound to one job kind.
pub struct WorkerPool {
    kind: JobKind,
    concurrency: usize,
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
}

impl WorkerPool {
    pub fn new(kind: JobKind, concurrency: usize, queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            kind,
            concurrency: concurrency.max(1),
            queue,
            handler,
        }
    }

    /// Spawn the workers. Each stops after its current job once `shutdown` fires.
    pub fn spawn(self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        tracing::info!(queue = %self.kind, concurrency = self.concurrency, "Starting worker pool");

        (0..self.concurrency)
            .map(|worker| {
                let queue = self.queue.clone();
                let handler = self.handler.clone();
                let kind = self.kind;
                let mut stop = shutdown.subscribe();
                tokio::spawn(async move {
                    loop {
                        let mut envelope = tokio::select! {
                            next = queue.dequeue(kind) => match next {
                                Some(envelope) => envelope,
                                None => break,
                            },
                            _ = stop.recv() => break,
                        };

                        if let Disposition::Retry(delay) = dispatch(handler.as_ref(), &mut envelope).await {
                            if let Err(e) = queue.retry_later(envelope, delay).await {
                                tracing::error!(queue = %kind, error = %e, "Failed to schedule redelivery");
                            }
                        }
                    }
                    tracing::debug!(queue = %kind, worker, "Worker stopped");
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::asset::Currency;
    use crate::queue::job::PrizePayoutJob;
    use crate::queue::memory::MemoryQueue;
    use crate::queue::policy::{Backoff, RetryPolicy};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error for the first `failures` attempts.
    struct Flaky {
        failures: u32,
        retryable: bool,
        calls: AtomicU32,
        exhausted: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, retryable: bool) -> Self {
            Self {
                failures,
                retryable,
                calls: AtomicU32::new(0),
                exhausted: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandler for Flaky {
        async fn handle(&self, _job: &Job, attempt: u32) -> Result<(), JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt <= self.failures {
                if self.retryable {
                    return Err(JobError::NotYetMined);
                }
                return Err(JobError::Reverted);
            }
            Ok(())
        }

        async fn exhausted(&self, _job: &Job, _last_error: &JobError) {
            self.exhausted.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn envelope(max_attempts: u32) -> Envelope {
        let job = Job::ProcessPrizePayout(PrizePayoutJob {
            user_id: "u1".into(),
            tournament_id: "t1".into(),
            amount: Decimal::ONE,
            currency: Currency::UsdtEth,
        });
        Envelope::new(job, RetryPolicy::new(max_attempts, Backoff::Fixed { delay_ms: 50 }))
    }

    #[tokio::test]
    async fn test_retry_until_budget_spent() {
        let handler = Flaky::new(u32::MAX, true);
        let mut env = envelope(3);

        assert_eq!(dispatch(&handler, &mut env).await, Disposition::Retry(Duration::from_millis(50)));
        assert_eq!(dispatch(&handler, &mut env).await, Disposition::Retry(Duration::from_millis(50)));
        assert_eq!(dispatch(&handler, &mut env).await, Disposition::Exhausted);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.exhausted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_error_ignores_budget() {
        let handler = Flaky::new(1, false);
        let mut env = envelope(10);

        assert_eq!(dispatch(&handler, &mut env).await, Disposition::Failed);
        assert_eq!(handler.exhausted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pool_redelivers_until_success() {
        let queue = Arc::new(MemoryQueue::default());
        let handler = Arc::new(Flaky::new(2, true));
        let shutdown = Shutdown::new();

        let policy = RetryPolicy::new(5, Backoff::Fixed { delay_ms: 1 });
        let job = envelope(5).job;
        queue.enqueue(job, policy).await.unwrap();

        let workers = WorkerPool::new(JobKind::ProcessPrizePayout, 2, queue.clone(), handler.clone()).spawn(&shutdown);

        for _ in 0..200 {
            if handler.calls.load(Ordering::SeqCst) >= 3 && queue.depth(JobKind::ProcessPrizePayout) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        shutdown.trigger();
        for worker in workers {
            worker.await.unwrap();
        }
    }
}
