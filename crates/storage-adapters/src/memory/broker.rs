//! # In-Memory Broker
//!
//! One unbounded queue per topic and a dead-letter list. Messages live only as
//! long as the process; the periodic scans re-dispatch anything lost.

use std::collections::HashMap;

use async_trait::async_trait;
use domains::{DomainResult, MessageBroker, PipelineMessage, Topic};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct TopicQueue {
    sender: mpsc::UnboundedSender<PipelineMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<PipelineMessage>>,
}

/// A parked message and why it was parked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub message: PipelineMessage,
    pub reason: String,
}

pub struct InMemoryBroker {
    queues: HashMap<Topic, TopicQueue>,
    dead: Mutex<Vec<DeadLetter>>,
    closed: CancellationToken,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        let queues = Topic::ALL
            .into_iter()
            .map(|topic| {
                let (sender, receiver) = mpsc::unbounded_channel();
                (topic, TopicQueue { sender, receiver: Mutex::new(receiver) })
            })
            .collect();
        Self { queues, dead: Mutex::new(Vec::new()), closed: CancellationToken::new() }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, topic: Topic) -> &TopicQueue {
        // Every topic gets a queue in `default`
        &self.queues[&topic]
    }

    /// Wakes every pending `receive` with `None`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Takes whatever is queued on `topic` without waiting.
    pub async fn drain(&self, topic: Topic) -> Vec<PipelineMessage> {
        let mut receiver = self.queue(topic).receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            drained.push(message);
        }
        drained
    }

    pub async fn queued(&self, topic: Topic) -> usize {
        self.queue(topic).receiver.lock().await.len()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead.lock().await.clone()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, message: &PipelineMessage) -> DomainResult<()> {
        // The receiver lives as long as the broker, so send cannot fail here
        let _ = self.queue(message.topic()).sender.send(message.clone());
        Ok(())
    }

    async fn receive(&self, topic: Topic) -> DomainResult<Option<PipelineMessage>> {
        let mut receiver = self.queue(topic).receiver.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(None),
            message = receiver.recv() => Ok(message),
        }
    }

    async fn park(&self, message: &PipelineMessage, reason: &str) -> DomainResult<()> {
        debug!(topic = %message.topic(), subject_id = message.subject_id(), reason, "message parked");
        self.dead.lock().await.push(DeadLetter { message: message.clone(), reason: reason.to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{ContentItem, ContentKind, Stage, UserInterestMessage};

    #[tokio::test]
    async fn messages_are_routed_by_topic() {
        let broker = InMemoryBroker::new();
        let post = ContentItem::new(ContentKind::Post, "a", "t", "c");
        broker.publish(&PipelineMessage::for_stage(Stage::Tagging, post.snapshot())).await.unwrap();
        broker
            .publish(&PipelineMessage::RefreshInterests(UserInterestMessage { profile_id: "p".into() }))
            .await
            .unwrap();

        assert_eq!(broker.queued(Topic::Tagging).await, 1);
        assert_eq!(broker.queued(Topic::Moderation).await, 0);
        let received = broker.receive(Topic::UserInterests).await.unwrap().unwrap();
        assert_eq!(received.subject_id(), "p");
    }

    #[tokio::test]
    async fn close_ends_receive() {
        let broker = InMemoryBroker::new();
        broker.close();
        assert_eq!(broker.receive(Topic::Embedding).await.unwrap(), None);
    }

    #[tokio::test]
    async fn parked_messages_are_kept_with_reason() {
        let broker = InMemoryBroker::new();
        let message = PipelineMessage::RefreshInterests(UserInterestMessage { profile_id: "p".into() });
        broker.park(&message, "rate limited: 429").await.unwrap();

        let dead = broker.dead_letters().await;
        assert_eq!(dead, vec![DeadLetter { message, reason: "rate limited: 429".into() }]);
    }
}
