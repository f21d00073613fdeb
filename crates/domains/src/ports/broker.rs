//! Message broker contract and the consumer-side handler contract.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::models::{PipelineMessage, Topic};

/// Publish/subscribe with per-topic routing and a dead-letter area.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, message: &PipelineMessage) -> DomainResult<()>;

    /// Waits for the next message on `topic`. `None` means the broker is closed.
    async fn receive(&self, topic: Topic) -> DomainResult<Option<PipelineMessage>>;

    /// Parks a poison message so it is never redelivered.
    async fn park(&self, message: &PipelineMessage, reason: &str) -> DomainResult<()>;
}

/// One stage consumer. Handling the same message twice must be harmless.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn topic(&self) -> Topic;

    async fn handle(&self, message: &PipelineMessage) -> DomainResult<()>;
}
