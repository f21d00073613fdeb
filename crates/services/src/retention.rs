//! # Notification Retention
//!
//! Read notifications older than the retention window are deleted in bulk.
//! Unread notifications are kept regardless of age.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domains::NotificationStore;
use tracing::info;

use crate::scheduler::PeriodicJob;

pub struct NotificationRetentionJob {
    store: Arc<dyn NotificationStore>,
    interval: Duration,
    retention: chrono::Duration,
}

impl NotificationRetentionJob {
    pub fn new(store: Arc<dyn NotificationStore>, interval: Duration, retention_days: i64) -> Self {
        Self { store, interval, retention: chrono::Duration::days(retention_days) }
    }
}

#[async_trait]
impl PeriodicJob for NotificationRetentionJob {
    fn name(&self) -> &str {
        "notification-retention"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<()> {
        let cutoff = Utc::now() - self.retention;
        let deleted = self.store.purge_read_before(cutoff).await?;
        info!(deleted, %cutoff, "purged read notifications");
        Ok(())
    }
}
