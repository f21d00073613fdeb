//! # In-Memory Store
//!
//! Implements the content, profile and notification ports over `DashMap`.
//! Used when no database is configured and by the integration tests.
//!
//! Every update happens under the shard lock of the single entry it touches,
//! which gives the same per-row atomicity as a single-row `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::{
    cosine_distance, ContentFlags, ContentItem, ContentKind, ContentSnapshot, ContentStore, DomainError,
    DomainResult, ModerationReport, NewNotification, Notification, NotificationStore, ProfileStore, Stage,
    UserProfile,
};
use uuid::Uuid;

type ContentKey = (ContentKind, String);

#[derive(Default)]
pub struct InMemoryStore {
    content: DashMap<ContentKey, ContentItem>,
    /// At most one report per content item
    reports: DashMap<ContentKey, ModerationReport>,
    profiles: DashMap<String, UserProfile>,
    notifications: DashMap<Uuid, Notification>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `item` as freshly authored content.
    pub fn insert_content(&self, item: ContentItem) {
        self.content.insert((item.kind, item.id.clone()), item);
    }

    pub fn content(&self, kind: ContentKind, id: &str) -> Option<ContentItem> {
        self.content.get(&(kind, id.to_string())).map(|entry| entry.clone())
    }

    pub fn report_for(&self, kind: ContentKind, id: &str) -> Option<ModerationReport> {
        self.reports.get(&(kind, id.to_string())).map(|entry| entry.clone())
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn profile(&self, id: &str) -> Option<UserProfile> {
        self.profiles.get(id).map(|entry| entry.clone())
    }

    /// Stored notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.notifications.iter().map(|entry| entry.clone()).collect();
        all.sort_by_key(|n| (n.created_at, n.id));
        all
    }

    pub fn notifications_for(&self, recipient_id: &str) -> Vec<Notification> {
        self.notifications().into_iter().filter(|n| n.recipient_id == recipient_id).collect()
    }

    /// Inserts an already persisted notification as is, e.g. an old read one.
    pub fn insert_notification(&self, notification: Notification) {
        self.notifications.insert(notification.id, notification);
    }

    /// Applies `update` to an existing item, or fails with `NotFound`.
    fn update(&self, kind: ContentKind, id: &str, update: impl FnOnce(&mut ContentItem)) -> DomainResult<()> {
        match self.content.get_mut(&(kind, id.to_string())) {
            Some(mut entry) => {
                update(entry.value_mut());
                Ok(())
            }
            None => Err(DomainError::NotFound(kind.label().to_string(), id.to_string())),
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn find_pending(&self, kind: ContentKind, stage: Stage) -> DomainResult<Vec<ContentSnapshot>> {
        let mut pending: Vec<ContentItem> = self
            .content
            .iter()
            .filter(|entry| entry.key().0 == kind && stage.is_pending(&entry.flags()))
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by_key(|item| item.created_at);
        Ok(pending.iter().map(ContentItem::snapshot).collect())
    }

    async fn get_flags(&self, kind: ContentKind, id: &str) -> DomainResult<Option<ContentFlags>> {
        Ok(self.content.get(&(kind, id.to_string())).map(|entry| entry.flags()))
    }

    async fn mark_processed(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        self.update(kind, id, |item| item.is_processed = true)
    }

    async fn apply_tags(&self, kind: ContentKind, id: &str, tags: &[String]) -> DomainResult<()> {
        self.update(kind, id, |item| {
            for tag in tags {
                if !item.tags.contains(tag) {
                    item.tags.push(tag.clone());
                }
            }
            item.is_tagged = true;
        })
    }

    async fn set_embedding(&self, kind: ContentKind, id: &str, embedding: &[f32]) -> DomainResult<()> {
        self.update(kind, id, |item| item.embedding = Some(embedding.to_vec()))
    }

    async fn remove_moderated(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        self.update(kind, id, |item| {
            item.is_removed = true;
            item.is_processed = true;
        })
    }

    async fn save_moderation_report(&self, report: &ModerationReport) -> DomainResult<()> {
        self.reports
            .entry((report.content_kind, report.content_id.clone()))
            .or_insert_with(|| report.clone());
        Ok(())
    }

    async fn finalize_visibility(&self) -> DomainResult<u64> {
        let mut updated = 0;
        for mut entry in self.content.iter_mut() {
            let item = entry.value_mut();
            if !item.is_safe_content && item.flags().ready_for_visibility() {
                item.is_safe_content = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn find_profiles_missing_interest_embedding(&self) -> DomainResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .profiles
            .iter()
            .filter(|entry| entry.interest_embedding.is_none() && !entry.interest_tags.is_empty())
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn interest_tags(&self, profile_id: &str) -> DomainResult<Option<Vec<String>>> {
        Ok(self.profiles.get(profile_id).map(|entry| entry.interest_tags.clone()))
    }

    async fn set_interest_embedding(&self, profile_id: &str, embedding: &[f32]) -> DomainResult<()> {
        match self.profiles.get_mut(profile_id) {
            Some(mut entry) => {
                entry.interest_embedding = Some(embedding.to_vec());
                Ok(())
            }
            None => Err(DomainError::NotFound("profile".into(), profile_id.to_string())),
        }
    }

    async fn find_interest_matches(&self, embedding: &[f32], max_distance: f32) -> DomainResult<Vec<String>> {
        let mut matches: Vec<(f32, String)> = self
            .profiles
            .iter()
            .filter_map(|entry| {
                let interests = entry.interest_embedding.as_deref()?;
                let distance = cosine_distance(embedding, interests)?;
                (distance < max_distance).then(|| (distance, entry.id.clone()))
            })
            .collect();
        matches.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(matches.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_batch(&self, batch: Vec<NewNotification>) -> DomainResult<Vec<Notification>> {
        let now = Utc::now();
        let stored: Vec<Notification> = batch.into_iter().map(|n| n.persist(now)).collect();
        for notification in &stored {
            self.notifications.insert(notification.id, notification.clone());
        }
        Ok(stored)
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let before = self.notifications.len();
        self.notifications.retain(|_, n| !(n.is_read && n.created_at < cutoff));
        Ok((before - self.notifications.len()) as u64)
    }
}
