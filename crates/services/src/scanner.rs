//! # Content Scanner
//!
//! Finds unfinished work in the store and turns it into broker messages.
//! The scanner never calls an analysis collaborator itself: it only enqueues,
//! so the provider rate limits are enforced where messages are consumed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domains::{ContentKind, ContentStore, DomainResult, MessageBroker, PipelineMessage, Stage};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::metrics::PipelineMetrics;

/// Outcome of one scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub found: usize,
    pub dispatched: usize,
    pub failed: usize,
}

pub struct ContentScanner {
    store: Arc<dyn ContentStore>,
    broker: Arc<dyn MessageBroker>,
    /// Publishes in flight at once; kept small on purpose
    concurrency: usize,
    metrics: PipelineMetrics,
}

impl ContentScanner {
    pub fn new(
        store: Arc<dyn ContentStore>,
        broker: Arc<dyn MessageBroker>,
        concurrency: usize,
        metrics: PipelineMetrics,
    ) -> Self {
        Self { store, broker, concurrency: concurrency.max(1), metrics }
    }

    /// Emits one `stage` message per `kind` item still pending that stage.
    pub async fn scan_and_dispatch(&self, kind: ContentKind, stage: Stage) -> DomainResult<ScanReport> {
        let pending = self.store.find_pending(kind, stage).await?;
        debug!(%kind, %stage, pending = pending.len(), "scan found pending content");

        let report = self
            .dispatch_all(stage.as_str(), pending, |snapshot| PipelineMessage::for_stage(stage, snapshot))
            .await;

        info!(
            %kind,
            %stage,
            found = report.found,
            dispatched = report.dispatched,
            failed = report.failed,
            "scan completed"
        );
        Ok(report)
    }

    /// Publishes `factory(item)` for every item.
    ///
    /// A failed publish is logged and counted; it never stops the rest of the
    /// pass. The item is still pending in the store, so the next tick retries it.
    pub async fn dispatch_all<T, F>(&self, label: &str, items: Vec<T>, factory: F) -> ScanReport
    where
        T: Send,
        F: Fn(T) -> PipelineMessage,
    {
        let found = items.len();
        let dispatched = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let (dispatched_ref, failed_ref) = (&dispatched, &failed);

        stream::iter(items.into_iter().map(factory))
            .for_each_concurrent(self.concurrency, |message| async move {
                match self.broker.publish(&message).await {
                    Ok(()) => {
                        dispatched_ref.fetch_add(1, Ordering::Relaxed);
                        self.metrics.dispatched.get_or_create(&PipelineMetrics::stage(label)).inc();
                    }
                    Err(err) => {
                        failed_ref.fetch_add(1, Ordering::Relaxed);
                        self.metrics.dispatch_failures.get_or_create(&PipelineMetrics::stage(label)).inc();
                        warn!(
                            stage = label,
                            subject_id = message.subject_id(),
                            error = %err,
                            "failed to dispatch message, will retry next scan"
                        );
                    }
                }
            })
            .await;

        ScanReport { found, dispatched: dispatched.into_inner(), failed: failed.into_inner() }
    }
}
