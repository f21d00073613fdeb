//! # Notification Delivery
//!
//! Single-producer side, single-consumer side, unbounded: producers never wait
//! on the store or the push hub. The worker persists a whole batch in one
//! write, then pushes every stored notification to its recipient only.
//!
//! Delivery is best-effort. A batch whose write fails is logged with its
//! contents, counted in `notifications_dropped`, and not retried.

use std::sync::Arc;

use domains::{DomainError, DomainResult, NewNotification, NotificationStore, PushHub, PushTarget};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::PipelineMetrics;

pub type NotificationReceiver = mpsc::UnboundedReceiver<Vec<NewNotification>>;

/// Producer handle; cheap to clone.
#[derive(Clone, Debug)]
pub struct NotificationSender {
    inner: mpsc::UnboundedSender<Vec<NewNotification>>,
}

impl NotificationSender {
    pub fn send(&self, batch: Vec<NewNotification>) -> DomainResult<()> {
        self.inner
            .send(batch)
            .map_err(|_| DomainError::Internal("notification delivery worker has stopped".into()))
    }
}

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (inner, receiver) = mpsc::unbounded_channel();
    (NotificationSender { inner }, receiver)
}

pub struct DeliveryWorker {
    receiver: NotificationReceiver,
    store: Arc<dyn NotificationStore>,
    hub: Arc<dyn PushHub>,
    metrics: PipelineMetrics,
}

impl DeliveryWorker {
    pub fn new(
        receiver: NotificationReceiver,
        store: Arc<dyn NotificationStore>,
        hub: Arc<dyn PushHub>,
        metrics: PipelineMetrics,
    ) -> Self {
        Self { receiver, store, hub, metrics }
    }

    /// Runs until cancelled or until every sender is gone. Batches already
    /// queued at cancellation are still delivered.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("notification delivery worker started");
        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = self.receiver.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };
            self.deliver_next(batch).await;
        }

        self.receiver.close();
        let mut drained = 0;
        while let Ok(batch) = self.receiver.try_recv() {
            self.deliver_next(batch).await;
            drained += 1;
        }
        info!(drained, "notification delivery worker stopped");
    }

    /// A failed batch has been logged and counted by `deliver`; the worker
    /// moves on to the next one.
    async fn deliver_next(&self, batch: Vec<NewNotification>) {
        match self.deliver(batch).await {
            Ok(persisted) => debug!(persisted, "notification batch delivered"),
            Err(err) => debug!(error = %err, "notification batch skipped"),
        }
    }

    /// Persists and pushes one batch. Returns how many were persisted.
    pub async fn deliver(&self, batch: Vec<NewNotification>) -> DomainResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let size = batch.len() as u64;

        // 1. One write for the whole batch
        let stored = match self.store.insert_batch(batch.clone()).await {
            Ok(stored) => stored,
            Err(err) => {
                self.metrics.notifications_dropped.inc_by(size);
                error!(error = %err, batch = ?batch, "failed to persist notification batch, dropping it");
                return Err(err);
            }
        };

        // 2. Push to the recipient's own connections; a failed push leaves the
        //    stored row for the client to fetch later
        for notification in &stored {
            let target = PushTarget::recipient(&notification.recipient_id);
            match self.hub.push(&target, notification).await {
                Ok(connections) => debug!(
                    notification_id = %notification.id,
                    recipient_id = %notification.recipient_id,
                    connections,
                    "notification pushed"
                ),
                Err(err) => warn!(
                    notification_id = %notification.id,
                    recipient_id = %notification.recipient_id,
                    error = %err,
                    "push failed, notification stays stored"
                ),
            }
        }

        self.metrics.notifications_delivered.inc_by(stored.len() as u64);
        Ok(stored.len())
    }
}
