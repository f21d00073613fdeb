//! # Connection Hub
//!
//! Tracks the live push connections of every user. A user may hold several
//! (one per open tab or device). A notification addressed to a recipient goes
//! to that recipient's connections and nowhere else.
//!
//! Dropping a `Subscription` unregisters its connection. A push also prunes
//! any connection whose receiver is already gone.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{DomainResult, Notification, PushHub, PushTarget};
use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

struct Connection {
    id: u64,
    sender: mpsc::UnboundedSender<Notification>,
}

/// The receiving end of one registered connection. Also a `Stream` of the
/// notifications pushed to it.
pub struct Subscription {
    pub user_id: String,
    pub connection_id: u64,
    pub receiver: mpsc::UnboundedReceiver<Notification>,
    hub: Weak<ConnectionHub>,
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Notification>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(&self.user_id, self.connection_id);
        }
    }
}

#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<String, Vec<Connection>>,
    next_id: AtomicU64,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection for `user_id`.
    pub fn subscribe(self: &Arc<Self>, user_id: impl Into<String>) -> Subscription {
        let user_id = user_id.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .entry(user_id.clone())
            .or_default()
            .push(Connection { id: connection_id, sender });
        debug!(%user_id, connection_id, "push connection registered");
        Subscription { user_id, connection_id, receiver, hub: Arc::downgrade(self) }
    }

    fn unsubscribe(&self, user_id: &str, connection_id: u64) {
        let remaining = match self.connections.get_mut(user_id) {
            Some(mut entry) => {
                entry.retain(|connection| connection.id != connection_id);
                entry.len()
            }
            None => return,
        };
        if remaining == 0 {
            self.connections.remove_if(user_id, |_, connections| connections.is_empty());
        }
        debug!(user_id, connection_id, "push connection closed");
    }

    /// Live connections of one user, after pruning closed ones.
    pub fn connection_count(&self, user_id: &str) -> usize {
        let count = match self.connections.get_mut(user_id) {
            Some(mut entry) => {
                entry.retain(|connection| !connection.sender.is_closed());
                entry.len()
            }
            None => return 0,
        };
        if count == 0 {
            self.connections.remove_if(user_id, |_, connections| connections.is_empty());
        }
        count
    }

    pub fn total_connections(&self) -> usize {
        self.connections.iter().map(|entry| entry.len()).sum()
    }

    fn push_to_user(&self, user_id: &str, notification: &Notification) -> usize {
        let delivered = match self.connections.get_mut(user_id) {
            Some(mut entry) => {
                // a failed send means the subscription is gone
                entry.retain(|connection| connection.sender.send(notification.clone()).is_ok());
                entry.len()
            }
            None => return 0,
        };
        if delivered == 0 {
            self.connections.remove_if(user_id, |_, connections| connections.is_empty());
        }
        delivered
    }
}

#[async_trait]
impl PushHub for ConnectionHub {
    async fn push(&self, target: &PushTarget, notification: &Notification) -> DomainResult<usize> {
        match target {
            PushTarget::Recipient(user_id) => Ok(self.push_to_user(user_id, notification)),
            PushTarget::Broadcast => {
                let users: Vec<String> = self.connections.iter().map(|entry| entry.key().clone()).collect();
                Ok(users.iter().map(|user_id| self.push_to_user(user_id, notification)).sum())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::NewNotification;
    use futures::StreamExt;

    fn notification(recipient: &str) -> Notification {
        NewNotification::new(recipient, "hello").persist(Utc::now())
    }

    #[tokio::test]
    async fn recipient_push_reaches_only_that_user() {
        let hub = Arc::new(ConnectionHub::new());
        let mut laptop = hub.subscribe("u1");
        let mut phone = hub.subscribe("u1");
        let mut other = hub.subscribe("u2");

        let sent = notification("u1");
        let delivered = hub.push(&PushTarget::recipient("u1"), &sent).await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(laptop.receiver.try_recv().unwrap(), sent);
        assert_eq!(phone.receiver.try_recv().unwrap(), sent);
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscriptions_unregister_without_a_push() {
        let hub = Arc::new(ConnectionHub::new());
        let kept = hub.subscribe("u1");
        for _ in 0..3 {
            drop(hub.subscribe("u1"));
        }
        drop(hub.subscribe("u2"));

        assert_eq!(hub.total_connections(), 1);
        assert!(hub.connections.get("u2").is_none());

        drop(kept);
        assert_eq!(hub.total_connections(), 0);
        assert!(hub.connections.is_empty());
    }

    #[tokio::test]
    async fn closed_receiver_is_pruned_on_push() {
        let hub = Arc::new(ConnectionHub::new());
        let mut closed = hub.subscribe("u1");
        closed.receiver.close();
        let _open = hub.subscribe("u1");

        let delivered = hub.push(&PushTarget::recipient("u1"), &notification("u1")).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(hub.connection_count("u1"), 1);
    }

    #[tokio::test]
    async fn subscription_streams_pushed_notifications() {
        let hub = Arc::new(ConnectionHub::new());
        let mut subscription = hub.subscribe("u1");

        let sent = notification("u1");
        hub.push(&PushTarget::recipient("u1"), &sent).await.unwrap();
        assert_eq!(subscription.next().await, Some(sent));
    }

    #[tokio::test]
    async fn offline_recipient_is_not_an_error() {
        let hub = Arc::new(ConnectionHub::new());
        assert_eq!(hub.push(&PushTarget::recipient("nobody"), &notification("nobody")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let hub = Arc::new(ConnectionHub::new());
        let mut a = hub.subscribe("u1");
        let mut b = hub.subscribe("u2");

        let delivered = hub.push(&PushTarget::Broadcast, &notification("u1")).await.unwrap();
        assert_eq!(delivered, 2);
        assert!(a.receiver.try_recv().is_ok());
        assert!(b.receiver.try_recv().is_ok());
    }
}
