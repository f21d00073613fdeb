//! # Scan Jobs
//!
//! One job per stage. Each pass walks every content kind, plus a daily pass
//! for profiles missing an interest embedding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::{ContentKind, PipelineMessage, ProfileStore, Stage, UserInterestMessage};
use tracing::{info, warn};

use crate::scanner::ContentScanner;
use crate::scheduler::PeriodicJob;

pub struct StageScanJob {
    name: String,
    stage: Stage,
    interval: Duration,
    scanner: Arc<ContentScanner>,
}

impl StageScanJob {
    pub fn new(stage: Stage, interval: Duration, scanner: Arc<ContentScanner>) -> Self {
        Self { name: format!("{stage}-scan"), stage, interval, scanner }
    }
}

#[async_trait]
impl PeriodicJob for StageScanJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<()> {
        // A failing kind is logged; the remaining kinds still get scanned.
        let mut failed_kinds = 0;
        for kind in ContentKind::ALL {
            if let Err(err) = self.scanner.scan_and_dispatch(kind, self.stage).await {
                failed_kinds += 1;
                warn!(%kind, stage = %self.stage, error = %err, "scan failed for content kind");
            }
        }
        if failed_kinds == ContentKind::ALL.len() {
            anyhow::bail!("{} scan failed for every content kind", self.stage);
        }
        Ok(())
    }
}

pub struct UserInterestScanJob {
    interval: Duration,
    profiles: Arc<dyn ProfileStore>,
    scanner: Arc<ContentScanner>,
}

impl UserInterestScanJob {
    pub fn new(interval: Duration, profiles: Arc<dyn ProfileStore>, scanner: Arc<ContentScanner>) -> Self {
        Self { interval, profiles, scanner }
    }
}

#[async_trait]
impl PeriodicJob for UserInterestScanJob {
    fn name(&self) -> &str {
        "user-interest-scan"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<()> {
        let pending = self.profiles.find_profiles_missing_interest_embedding().await?;
        let report = self
            .scanner
            .dispatch_all("user_interests", pending, |profile_id| {
                PipelineMessage::RefreshInterests(UserInterestMessage { profile_id })
            })
            .await;
        info!(
            found = report.found,
            dispatched = report.dispatched,
            failed = report.failed,
            "user interest scan completed"
        );
        Ok(())
    }
}

/// Convenience for wiring: one scan job per stage with its interval.
pub fn stage_scan_jobs(
    scanner: &Arc<ContentScanner>,
    intervals: [(Stage, Duration); 3],
) -> Vec<Arc<dyn PeriodicJob>> {
    intervals
        .into_iter()
        .map(|(stage, interval)| {
            Arc::new(StageScanJob::new(stage, interval, Arc::clone(scanner))) as Arc<dyn PeriodicJob>
        })
        .collect()
}
