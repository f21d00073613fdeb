//! # Consumer Runtime
//!
//! Drives one `MessageHandler` against its broker topic with bounded
//! concurrency. Transient failures are redelivered a fixed number of times at
//! a fixed interval; after that, or on any permanent failure, the message is
//! parked and the group moves on.

use std::sync::Arc;
use std::time::Duration;

use domains::{DomainError, MessageBroker, MessageHandler, PipelineMessage};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::PipelineMetrics;

/// Fixed-count, fixed-interval redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 2, interval: Duration::from_millis(1000) }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Handled { attempts: u32 },
    Parked { attempts: u32, reason: String },
}

#[derive(Clone)]
pub struct ConsumerGroup {
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn MessageHandler>,
    concurrency: usize,
    retry: RetryPolicy,
    metrics: PipelineMetrics,
}

impl ConsumerGroup {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
        concurrency: usize,
        retry: RetryPolicy,
        metrics: PipelineMetrics,
    ) -> Self {
        Self { broker, handler, concurrency: concurrency.max(1), retry, metrics }
    }

    /// Consumes until `cancel` fires or the broker closes. Intake stops first;
    /// handlers already running are awaited before returning.
    pub async fn run(self, cancel: CancellationToken) {
        let topic = self.handler.topic();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight = JoinSet::new();
        info!(%topic, concurrency = self.concurrency, "consumer group started");

        loop {
            while let Some(result) = in_flight.try_join_next() {
                log_join_error(result);
            }

            // 1. Wait for a free handler slot
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // 2. Wait for a message
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.broker.receive(topic) => received,
            };

            // 3. Hand it to a task that owns the slot until it finishes
            match received {
                Ok(Some(message)) => {
                    let group = self.clone();
                    in_flight.spawn(async move {
                        group.process(message).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    info!(%topic, "broker closed the topic");
                    break;
                }
                Err(err) => {
                    warn!(%topic, error = %err, "receive failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry.interval) => {}
                    }
                }
            }
        }

        debug!(%topic, in_flight = in_flight.len(), "draining in-flight handlers");
        while let Some(result) = in_flight.join_next().await {
            log_join_error(result);
        }
        info!(%topic, "consumer group stopped");
    }

    /// Handles one message under the retry policy.
    pub async fn process(&self, message: PipelineMessage) -> Delivery {
        let topic = self.handler.topic();
        let labels = PipelineMetrics::topic(topic.as_str());
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match self.handler.handle(&message).await {
                Ok(()) => {
                    self.metrics.consumed.get_or_create(&labels).inc();
                    return Delivery::Handled { attempts };
                }
                Err(err) => err,
            };

            if err.is_transient() && attempts <= self.retry.retries {
                self.metrics.retries.get_or_create(&labels).inc();
                warn!(
                    %topic,
                    subject_id = message.subject_id(),
                    attempt = attempts,
                    error = %err,
                    "transient failure, redelivering"
                );
                tokio::time::sleep(self.retry.interval).await;
                continue;
            }

            return self.park(message, attempts, err).await;
        }
    }

    async fn park(&self, message: PipelineMessage, attempts: u32, err: DomainError) -> Delivery {
        let topic = self.handler.topic();
        let reason = err.to_string();
        self.metrics.poisoned.get_or_create(&PipelineMetrics::topic(topic.as_str())).inc();
        error!(
            %topic,
            subject_id = message.subject_id(),
            attempts,
            error = %err,
            "message is poison, parking it"
        );
        if let Err(park_err) = self.broker.park(&message, &reason).await {
            error!(%topic, subject_id = message.subject_id(), error = %park_err, "failed to park message");
        }
        Delivery::Parked { attempts, reason }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        error!(error = %err, "message handler task panicked");
    }
}
