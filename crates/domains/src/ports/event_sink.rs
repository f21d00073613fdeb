use async_trait::async_trait;

use crate::error::DomainResult;
use crate::models::DomainEvent;

/// Where stage consumers raise domain events (e.g., content removed).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DomainEventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> DomainResult<()>;
}
