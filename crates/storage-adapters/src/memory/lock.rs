//! # In-Process Job Lock
//!
//! Leases keyed by job name with an expiry. Enough for a single worker
//! instance; multiple instances need the Redis lock.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{DomainResult, JobLock, LockLease};
use tokio::time::Instant;
use uuid::Uuid;

struct Held {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryJobLock {
    held: DashMap<String, Held>,
}

impl InMemoryJobLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobLock for InMemoryJobLock {
    async fn try_acquire(&self, job: &str, ttl: Duration) -> DomainResult<Option<LockLease>> {
        let now = Instant::now();
        let token = Uuid::new_v4().to_string();
        let fresh = Held { token: token.clone(), expires_at: now + ttl };

        match self.held.entry(job.to_string()) {
            Entry::Occupied(entry) if entry.get().expires_at > now => return Ok(None),
            Entry::Occupied(mut entry) => {
                entry.insert(fresh);
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
            }
        }
        Ok(Some(LockLease { job: job.to_string(), token }))
    }

    async fn release(&self, lease: LockLease) -> DomainResult<()> {
        // Only the holder may release; an expired-and-retaken lease is left alone
        self.held.remove_if(&lease.job, |_, held| held.token == lease.token);
        Ok(())
    }
}
