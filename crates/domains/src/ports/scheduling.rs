use async_trait::async_trait;
use std::time::Duration;

use crate::error::DomainResult;

/// Proof of holding a job lock; hand it back to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub job: String,
    pub token: String,
}

/// Mutual exclusion per job identity, possibly across worker instances.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JobLock: Send + Sync {
    /// `None` when another run of `job` holds the lock. The lease expires
    /// after `ttl` so a crashed holder cannot block the job forever.
    async fn try_acquire(&self, job: &str, ttl: Duration) -> DomainResult<Option<LockLease>>;

    async fn release(&self, lease: LockLease) -> DomainResult<()>;
}
