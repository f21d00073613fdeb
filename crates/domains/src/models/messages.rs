//! # Stage Message Contracts
//!
//! Immutable work orders exchanged over the broker. A message carries enough
//! payload for a consumer to act without re-reading the store, but it is not
//! state: consumers always re-check the store's flags by id before writing.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::content::{ContentKind, ContentSnapshot, Stage};

/// Broker routing key. One consumer group per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Moderation,
    Tagging,
    Embedding,
    UserInterests,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Moderation, Topic::Tagging, Topic::Embedding, Topic::UserInterests];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Moderation => "moderation",
            Topic::Tagging => "tagging",
            Topic::Embedding => "embedding",
            Topic::UserInterests => "user_interests",
        }
    }
}

impl From<Stage> for Topic {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Moderation => Topic::Moderation,
            Stage::Tagging => Topic::Tagging,
            Stage::Embedding => Topic::Embedding,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload shared by the three content stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMessage {
    pub content_id: String,
    pub kind: ContentKind,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl StageMessage {
    /// Text handed to moderation and embedding collaborators.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.content).trim().to_string()
    }
}

impl From<ContentSnapshot> for StageMessage {
    fn from(snapshot: ContentSnapshot) -> Self {
        Self {
            content_id: snapshot.id,
            kind: snapshot.kind,
            author_id: snapshot.author_id,
            title: snapshot.title,
            content: snapshot.content,
        }
    }
}

/// Asks for a profile's interest embedding to be (re)computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInterestMessage {
    pub profile_id: String,
}

/// Everything that travels over the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PipelineMessage {
    Moderate(StageMessage),
    Tag(StageMessage),
    Embed(StageMessage),
    RefreshInterests(UserInterestMessage),
}

impl PipelineMessage {
    /// Builds the work order for `stage` from a scanned snapshot.
    pub fn for_stage(stage: Stage, snapshot: ContentSnapshot) -> Self {
        let message = StageMessage::from(snapshot);
        match stage {
            Stage::Moderation => PipelineMessage::Moderate(message),
            Stage::Tagging => PipelineMessage::Tag(message),
            Stage::Embedding => PipelineMessage::Embed(message),
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            PipelineMessage::Moderate(_) => Topic::Moderation,
            PipelineMessage::Tag(_) => Topic::Tagging,
            PipelineMessage::Embed(_) => Topic::Embedding,
            PipelineMessage::RefreshInterests(_) => Topic::UserInterests,
        }
    }

    /// Id of the entity the message is about, for logs.
    pub fn subject_id(&self) -> &str {
        match self {
            PipelineMessage::Moderate(m) | PipelineMessage::Tag(m) | PipelineMessage::Embed(m) => &m.content_id,
            PipelineMessage::RefreshInterests(m) => &m.profile_id,
        }
    }
}
