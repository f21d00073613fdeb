//! Persistence contracts for content, profiles and notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainResult;
use crate::models::{
    ContentFlags, ContentKind, ContentSnapshot, ModerationReport, NewNotification, Notification, Stage,
};

/// Read/write access to content items and their processing flags.
///
/// Every update addresses a single item by id and touches only the field the
/// calling stage owns. Flags only ever move from unset to set.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Items of `kind` for which `stage` is still pending, excluding removed items.
    async fn find_pending(&self, kind: ContentKind, stage: Stage) -> DomainResult<Vec<ContentSnapshot>>;

    /// Current flags, or `None` if the item does not exist.
    async fn get_flags(&self, kind: ContentKind, id: &str) -> DomainResult<Option<ContentFlags>>;

    async fn mark_processed(&self, kind: ContentKind, id: &str) -> DomainResult<()>;

    /// Attaches tags and sets `is_tagged` in one write.
    async fn apply_tags(&self, kind: ContentKind, id: &str, tags: &[String]) -> DomainResult<()>;

    async fn set_embedding(&self, kind: ContentKind, id: &str, embedding: &[f32]) -> DomainResult<()>;

    /// Soft delete that also sets `is_processed`, in one write. Removed items
    /// drop out of every scan and never become visible.
    async fn remove_moderated(&self, kind: ContentKind, id: &str) -> DomainResult<()>;

    /// Upsert keyed by content; a second report for the same item is a no-op.
    async fn save_moderation_report(&self, report: &ModerationReport) -> DomainResult<()>;

    /// Set-based: `is_safe_content = true` wherever all three stages are done.
    /// Returns the number of items that became visible.
    async fn finalize_visibility(&self) -> DomainResult<u64>;
}

/// Profile data needed for interest embeddings and job matching.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profiles_missing_interest_embedding(&self) -> DomainResult<Vec<String>>;

    /// `None` if the profile does not exist.
    async fn interest_tags(&self, profile_id: &str) -> DomainResult<Option<Vec<String>>>;

    async fn set_interest_embedding(&self, profile_id: &str, embedding: &[f32]) -> DomainResult<()>;

    /// Profiles whose interest embedding lies strictly within `max_distance`
    /// (cosine) of `embedding`, nearest first.
    async fn find_interest_matches(&self, embedding: &[f32], max_distance: f32) -> DomainResult<Vec<String>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a whole batch in one write and returns the stored rows.
    async fn insert_batch(&self, batch: Vec<NewNotification>) -> DomainResult<Vec<Notification>>;

    /// Bulk delete of read notifications created before `cutoff`.
    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;
}
