//! # Domain Events
//!
//! Raised by authoring paths and stage consumers; the notification facade
//! subscribes to them. Events carry everything needed to render a
//! notification so the facade never touches the store.

use serde::{Deserialize, Serialize};

use super::content::{ContentKind, ContentRef};

/// Who performed an action, as shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCreated {
    pub comment_id: String,
    pub author: Actor,
    pub content: String,
    /// The post or job posting the comment lives under
    pub target: ContentRef,
    /// Set when the comment is a reply
    pub parent_comment_author_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteTarget {
    Post { id: String, title: String, author_id: String },
    JobPosting { id: String, title: String, author_id: String },
    Comment { id: String, content: String, author_id: String, parent: ContentRef },
}

impl VoteTarget {
    pub fn author_id(&self) -> &str {
        match self {
            VoteTarget::Post { author_id, .. }
            | VoteTarget::JobPosting { author_id, .. }
            | VoteTarget::Comment { author_id, .. } => author_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVoted {
    pub voter: Actor,
    pub target: VoteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRemoved {
    pub kind: ContentKind,
    pub content_id: String,
    pub author_id: String,
    /// Title for posts and job postings, body for comments
    pub excerpt: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMatched {
    pub job_posting_id: String,
    pub author_id: String,
    pub title: String,
    pub candidate_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    CommentCreated(CommentCreated),
    ContentVoted(ContentVoted),
    ContentRemoved(ContentRemoved),
    JobMatched(JobMatched),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::CommentCreated(_) => "comment_created",
            DomainEvent::ContentVoted(_) => "content_voted",
            DomainEvent::ContentRemoved(_) => "content_removed",
            DomainEvent::JobMatched(_) => "job_matched",
        }
    }
}
