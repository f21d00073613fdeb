//! # Visibility Finalizer
//!
//! Stage completion order is not fixed, so no consumer can tell it finished
//! last. This job re-evaluates the conjunction of all three stage fields in a
//! single set-based update and is the only writer of `is_safe_content`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::ContentStore;
use tracing::{debug, info};

use crate::metrics::PipelineMetrics;
use crate::scheduler::PeriodicJob;

pub struct VisibilityFinalizer {
    store: Arc<dyn ContentStore>,
    interval: Duration,
    metrics: PipelineMetrics,
}

impl VisibilityFinalizer {
    pub fn new(store: Arc<dyn ContentStore>, interval: Duration, metrics: PipelineMetrics) -> Self {
        Self { store, interval, metrics }
    }

    /// One pass. Returns how many items became visible.
    pub async fn finalize(&self) -> domains::DomainResult<u64> {
        let updated = self.store.finalize_visibility().await?;
        self.metrics.finalized.inc_by(updated);
        if updated > 0 {
            info!(updated, "content became visible");
        } else {
            debug!("no content ready for visibility");
        }
        Ok(updated)
    }
}

#[async_trait]
impl PeriodicJob for VisibilityFinalizer {
    fn name(&self) -> &str {
        "visibility-finalizer"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.finalize().await?;
        Ok(())
    }
}
