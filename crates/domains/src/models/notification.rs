//! # Notification Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification as built by the facade, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    /// `None` for system notifications (e.g., moderation removals)
    pub sender_id: Option<String>,
    pub message: String,
    pub action_url: Option<String>,
    pub icon_url: Option<String>,
    pub icon_action_url: Option<String>,
}

impl NewNotification {
    pub fn new(recipient_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            sender_id: None,
            message: message.into(),
            action_url: None,
            icon_url: None,
            icon_action_url: None,
        }
    }

    pub fn from_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_action(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn with_icon(mut self, icon_url: Option<String>, icon_action_url: Option<String>) -> Self {
        self.icon_url = icon_url;
        self.icon_action_url = icon_action_url;
        self
    }

    /// Notifying someone about their own action is noise.
    pub fn is_self_notification(&self) -> bool {
        self.sender_id.as_deref() == Some(self.recipient_id.as_str())
    }

    /// Assigns identity and creation time; used by stores on insert.
    pub fn persist(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::now_v7(),
            recipient_id: self.recipient_id,
            sender_id: self.sender_id,
            message: self.message,
            action_url: self.action_url,
            icon_url: self.icon_url,
            icon_action_url: self.icon_action_url,
            is_read: false,
            created_at,
        }
    }
}

/// A persisted notification, as pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub message: String,
    pub action_url: Option<String>,
    pub icon_url: Option<String>,
    pub icon_action_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
