//! # Periodic Scheduler
//!
//! One tokio task per job. A tick runs only while holding the job's lock, so
//! a job never overlaps with itself, even across worker instances. Different
//! jobs run independently of each other.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::JobLock;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Leases never expire sooner than this, whatever the job interval.
const MIN_LOCK_TTL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Stable identity; also the lock key.
    fn name(&self) -> &str;

    fn interval(&self) -> Duration;

    /// How long a lease is held before another instance may take over.
    fn lock_ttl(&self) -> Duration {
        (self.interval() * 2).max(MIN_LOCK_TTL)
    }

    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    /// Another run held the lock
    Skipped,
    Failed,
}

/// Runs `job` once under its lock.
pub async fn run_locked(job: &dyn PeriodicJob, lock: &dyn JobLock) -> TickOutcome {
    let lease = match lock.try_acquire(job.name(), job.lock_ttl()).await {
        Ok(Some(lease)) => lease,
        Ok(None) => {
            debug!(job = job.name(), "previous run still holds the lock, skipping tick");
            return TickOutcome::Skipped;
        }
        Err(err) => {
            warn!(job = job.name(), error = %err, "could not acquire job lock, skipping tick");
            return TickOutcome::Skipped;
        }
    };

    let outcome = match job.run().await {
        Ok(()) => TickOutcome::Completed,
        Err(err) => {
            error!(job = job.name(), error = %err, "periodic job failed");
            TickOutcome::Failed
        }
    };

    if let Err(err) = lock.release(lease).await {
        warn!(job = job.name(), error = %err, "failed to release job lock; it will expire");
    }
    outcome
}

pub struct Scheduler {
    lock: Arc<dyn JobLock>,
    start_delay: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Scheduler {
    pub fn new(lock: Arc<dyn JobLock>, start_delay: Duration, cancel: CancellationToken) -> Self {
        Self { lock, start_delay, cancel, tasks: JoinSet::new() }
    }

    /// Starts ticking `job` after the start delay.
    pub fn spawn(&mut self, job: Arc<dyn PeriodicJob>) {
        let lock = Arc::clone(&self.lock);
        let cancel = self.cancel.clone();
        let start_delay = self.start_delay;
        self.tasks.spawn(async move { job_loop(job, lock, start_delay, cancel).await });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every job loop to exit. Loops exit once the token is cancelled
    /// and their current run (if any) finishes.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "scheduler task panicked");
            }
        }
    }
}

async fn job_loop(job: Arc<dyn PeriodicJob>, lock: Arc<dyn JobLock>, start_delay: Duration, cancel: CancellationToken) {
    if job.interval().is_zero() {
        error!(job = job.name(), "job interval is zero, job not scheduled");
        return;
    }

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = time::sleep(start_delay) => {}
    }

    let mut ticker = time::interval(job.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(job = job.name(), interval_secs = job.interval().as_secs(), "job scheduled");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // The run itself is not raced against cancellation so a store write
        // is never cut in half.
        run_locked(job.as_ref(), lock.as_ref()).await;
    }
    info!(job = job.name(), "job stopped");
}
