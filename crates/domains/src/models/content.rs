//! # Content Models
//!
//! Posts, job postings and comments share one lifecycle, so they are one
//! type with a [`ContentKind`] discriminator rather than three structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which concrete variant a content item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    JobPosting,
    Comment,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Post, ContentKind::JobPosting, ContentKind::Comment];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::JobPosting => "job_posting",
            ContentKind::Comment => "comment",
        }
    }

    /// Human label used in notification text (e.g., "job posting").
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::JobPosting => "job posting",
            ContentKind::Comment => "comment",
        }
    }

    /// URL segment of the public page (e.g., "/jobs/{id}").
    pub fn path_segment(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::JobPosting => "jobs",
            ContentKind::Comment => "comments",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete step of the readiness pipeline. Each stage owns exactly one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Owns `is_processed`
    Moderation,
    /// Owns `is_tagged`
    Tagging,
    /// Owns `embedding`
    Embedding,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Moderation, Stage::Tagging, Stage::Embedding];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Moderation => "moderation",
            Stage::Tagging => "tagging",
            Stage::Embedding => "embedding",
        }
    }

    /// The "not yet done" predicate scanners query for.
    pub fn is_pending(&self, flags: &ContentFlags) -> bool {
        if flags.is_removed {
            return false;
        }
        match self {
            Stage::Moderation => !flags.is_processed,
            Stage::Tagging => !flags.is_tagged,
            Stage::Embedding => !flags.has_embedding,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content item with its lifecycle flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub author_id: String,
    /// Empty for comments
    pub title: String,
    pub content: String,
    /// Moderation stage complete
    pub is_processed: bool,
    /// Tagging stage complete
    pub is_tagged: bool,
    /// `None` until the embedding stage completes
    pub embedding: Option<Vec<f32>>,
    /// Terminal flag, only ever set by the visibility finalizer
    pub is_safe_content: bool,
    /// Soft-deleted after a negative moderation verdict
    pub is_removed: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Fresh content as the authoring endpoint creates it: every flag unset.
    pub fn new(
        kind: ContentKind,
        author_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            author_id: author_id.into(),
            title: title.into(),
            content: content.into(),
            is_processed: false,
            is_tagged: false,
            embedding: None,
            is_safe_content: false,
            is_removed: false,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn flags(&self) -> ContentFlags {
        ContentFlags {
            is_processed: self.is_processed,
            is_tagged: self.is_tagged,
            has_embedding: self.embedding.is_some(),
            is_safe_content: self.is_safe_content,
            is_removed: self.is_removed,
        }
    }

    pub fn snapshot(&self) -> ContentSnapshot {
        ContentSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            author_id: self.author_id.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// The flags a stage consumer checks before doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentFlags {
    pub is_processed: bool,
    pub is_tagged: bool,
    pub has_embedding: bool,
    pub is_safe_content: bool,
    pub is_removed: bool,
}

impl ContentFlags {
    /// `is_processed ∧ is_tagged ∧ embedding ≠ null`, the only condition
    /// under which `is_safe_content` may become true.
    pub fn ready_for_visibility(&self) -> bool {
        self.is_processed && self.is_tagged && self.has_embedding && !self.is_removed
    }
}

/// Only the fields needed to build a stage message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub id: String,
    pub kind: ContentKind,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

/// A pointer to the content a comment or vote is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: String,
    pub author_id: String,
}

impl ContentRef {
    /// e.g. "/posts/{id}"
    pub fn url(&self) -> String {
        format!("/{}/{}", self.kind.path_segment(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_content_has_every_stage_pending() {
        let post = ContentItem::new(ContentKind::Post, "author-1", "Hello", "Rust!");
        let flags = post.flags();
        for stage in Stage::ALL {
            assert!(stage.is_pending(&flags), "{stage} should be pending");
        }
        assert!(!flags.ready_for_visibility());
    }

    #[test]
    fn removed_content_is_never_pending() {
        let mut post = ContentItem::new(ContentKind::JobPosting, "a", "t", "c");
        post.is_removed = true;
        assert!(Stage::ALL.iter().all(|s| !s.is_pending(&post.flags())));
    }

    #[test]
    fn visibility_requires_all_three_stages() {
        let mut flags = ContentFlags {
            is_processed: true,
            is_tagged: true,
            has_embedding: true,
            ..Default::default()
        };
        assert!(flags.ready_for_visibility());
        flags.is_tagged = false;
        assert!(!flags.ready_for_visibility());
    }

    #[test]
    fn content_ref_url_uses_kind_segment() {
        let target = ContentRef { kind: ContentKind::JobPosting, id: "j1".into(), author_id: "a".into() };
        assert_eq!(target.url(), "/jobs/j1");
    }
}
