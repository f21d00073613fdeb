//! Real-time push transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainResult;
use crate::models::Notification;

/// Addressing for a push. Notifications always go to `Recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushTarget {
    /// Every live connection of one user
    Recipient(String),
    /// Every live connection; reserved for system-wide messages
    Broadcast,
}

impl PushTarget {
    pub fn recipient(id: impl Into<String>) -> Self {
        PushTarget::Recipient(id.into())
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PushHub: Send + Sync {
    /// Returns how many connections received the notification.
    async fn push(&self, target: &PushTarget, notification: &Notification) -> DomainResult<usize>;
}
