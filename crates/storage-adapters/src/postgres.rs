//! # PostgreSQL Store
//!
//! Maps the content, profile and notification ports onto Postgres with the
//! `pgvector` extension. Migrations are owned by the authoring service; this
//! adapter expects the following columns:
//!
//! - `posts`, `job_postings`: `id text`, `author_id text`, `title text`,
//!   `content text`, `is_processed bool`, `is_tagged bool`,
//!   `embedding vector(1024) NULL`, `is_safe_content bool`, `is_deleted bool`,
//!   `created_at timestamptz`
//! - `comments`: same, without `title`
//! - `content_tags`: `content_kind text`, `content_id text`, `tag text`,
//!   primary key on all three
//! - `moderation_reports`: `id uuid`, `content_kind text`, `content_id text`,
//!   `author_id text`, `reason text`, `is_negative bool`, `is_resolved bool`,
//!   `scores jsonb`, `created_at timestamptz`, unique on
//!   `(content_kind, content_id)`
//! - `profiles`: `id text`, `interest_embedding vector(1024) NULL`
//! - `user_interests`: `profile_id text`, `tag text`
//! - `notifications`: `id uuid`, `recipient_id text`, `sender_id text NULL`,
//!   `message text`, `action_url text NULL`, `icon_url text NULL`,
//!   `icon_action_url text NULL`, `is_read bool`, `created_at timestamptz`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    ContentFlags, ContentKind, ContentSnapshot, ContentStore, DomainError, DomainResult, ModerationReport,
    NewNotification, Notification, NotificationStore, ProfileStore, Stage,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

pub struct PostgresStore {
    pool: PgPool,
}

fn store_err(err: sqlx::Error) -> DomainError {
    DomainError::Store(err.to_string())
}

fn table(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Post => "posts",
        ContentKind::JobPosting => "job_postings",
        ContentKind::Comment => "comments",
    }
}

/// Comments have no title column.
fn title_column(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Comment => "'' AS title",
        ContentKind::Post | ContentKind::JobPosting => "title",
    }
}

fn pending_predicate(stage: Stage) -> &'static str {
    match stage {
        Stage::Moderation => "is_processed = false",
        Stage::Tagging => "is_tagged = false",
        Stage::Embedding => "embedding IS NULL",
    }
}

/// pgvector text literal, e.g. `[0.1,0.2]`; bound as text and cast in SQL.
fn vector_literal(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

const READY: &str = "is_processed AND is_tagged AND embedding IS NOT NULL AND NOT is_safe_content AND NOT is_deleted";

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(store_err)?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_flag(&self, kind: ContentKind, id: &str, assignment: &str) -> DomainResult<()> {
        let sql = format!("UPDATE {} SET {assignment} WHERE id = $1", table(kind));
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await.map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(kind.label().to_string(), id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn find_pending(&self, kind: ContentKind, stage: Stage) -> DomainResult<Vec<ContentSnapshot>> {
        let sql = format!(
            "SELECT id, author_id, {}, content FROM {} WHERE {} AND is_deleted = false ORDER BY created_at",
            title_column(kind),
            table(kind),
            pending_predicate(stage),
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|row| ContentSnapshot {
                id: row.get("id"),
                kind,
                author_id: row.get("author_id"),
                title: row.get("title"),
                content: row.get("content"),
            })
            .collect())
    }

    async fn get_flags(&self, kind: ContentKind, id: &str) -> DomainResult<Option<ContentFlags>> {
        let sql = format!(
            "SELECT is_processed, is_tagged, embedding IS NOT NULL AS has_embedding, is_safe_content, is_deleted \
             FROM {} WHERE id = $1",
            table(kind)
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await.map_err(store_err)?;
        Ok(row.map(|row| ContentFlags {
            is_processed: row.get("is_processed"),
            is_tagged: row.get("is_tagged"),
            has_embedding: row.get("has_embedding"),
            is_safe_content: row.get("is_safe_content"),
            is_removed: row.get("is_deleted"),
        }))
    }

    async fn mark_processed(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        self.set_flag(kind, id, "is_processed = true").await
    }

    /// Tags and the flag go in one transaction.
    async fn apply_tags(&self, kind: ContentKind, id: &str, tags: &[String]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // 1. Attach tags; repeats are ignored
        sqlx::query(
            "INSERT INTO content_tags (content_kind, content_id, tag) \
             SELECT $1, $2, tag FROM UNNEST($3::text[]) AS tag \
             ON CONFLICT DO NOTHING",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(tags)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // 2. Close the stage
        let sql = format!("UPDATE {} SET is_tagged = true WHERE id = $1", table(kind));
        let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await.map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(kind.label().to_string(), id.to_string()));
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn set_embedding(&self, kind: ContentKind, id: &str, embedding: &[f32]) -> DomainResult<()> {
        let sql = format!("UPDATE {} SET embedding = $2::text::vector WHERE id = $1", table(kind));
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(vector_literal(embedding))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(kind.label().to_string(), id.to_string()));
        }
        Ok(())
    }

    async fn remove_moderated(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        self.set_flag(kind, id, "is_deleted = true, is_processed = true").await
    }

    async fn save_moderation_report(&self, report: &ModerationReport) -> DomainResult<()> {
        let scores = serde_json::to_value(report.scores)?;
        sqlx::query(
            "INSERT INTO moderation_reports \
             (id, content_kind, content_id, author_id, reason, is_negative, is_resolved, scores, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (content_kind, content_id) DO NOTHING",
        )
        .bind(report.id)
        .bind(report.content_kind.as_str())
        .bind(&report.content_id)
        .bind(&report.author_id)
        .bind(&report.reason)
        .bind(report.is_negative)
        .bind(report.is_resolved)
        .bind(scores)
        .bind(report.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// One statement across all three tables.
    async fn finalize_visibility(&self) -> DomainResult<u64> {
        let sql = format!(
            "WITH p AS (UPDATE posts SET is_safe_content = true WHERE {READY} RETURNING 1), \
                  j AS (UPDATE job_postings SET is_safe_content = true WHERE {READY} RETURNING 1), \
                  c AS (UPDATE comments SET is_safe_content = true WHERE {READY} RETURNING 1) \
             SELECT (SELECT count(*) FROM p) + (SELECT count(*) FROM j) + (SELECT count(*) FROM c) AS updated"
        );
        let row = sqlx::query(&sql).fetch_one(&self.pool).await.map_err(store_err)?;
        let updated: i64 = row.get("updated");
        Ok(updated.max(0) as u64)
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn find_profiles_missing_interest_embedding(&self) -> DomainResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT p.id FROM profiles p \
             WHERE p.interest_embedding IS NULL \
               AND EXISTS (SELECT 1 FROM user_interests ui WHERE ui.profile_id = p.id) \
             ORDER BY p.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    async fn interest_tags(&self, profile_id: &str) -> DomainResult<Option<Vec<String>>> {
        let row = sqlx::query(
            "SELECT p.id, COALESCE(array_agg(ui.tag ORDER BY ui.tag) FILTER (WHERE ui.tag IS NOT NULL), '{}') AS tags \
             FROM profiles p LEFT JOIN user_interests ui ON ui.profile_id = p.id \
             WHERE p.id = $1 GROUP BY p.id",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|row| row.get::<Vec<String>, _>("tags")))
    }

    async fn set_interest_embedding(&self, profile_id: &str, embedding: &[f32]) -> DomainResult<()> {
        let result = sqlx::query("UPDATE profiles SET interest_embedding = $2::text::vector WHERE id = $1")
            .bind(profile_id)
            .bind(vector_literal(embedding))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("profile".into(), profile_id.to_string()));
        }
        Ok(())
    }

    async fn find_interest_matches(&self, embedding: &[f32], max_distance: f32) -> DomainResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT id FROM profiles \
             WHERE interest_embedding IS NOT NULL \
               AND (interest_embedding <=> $1::text::vector) < $2 \
             ORDER BY interest_embedding <=> $1::text::vector",
        )
        .bind(vector_literal(embedding))
        .bind(f64::from(max_distance))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    /// One `INSERT ... SELECT FROM UNNEST` for the whole batch.
    async fn insert_batch(&self, batch: Vec<NewNotification>) -> DomainResult<Vec<Notification>> {
        let now = Utc::now();
        let stored: Vec<Notification> = batch.into_iter().map(|n| n.persist(now)).collect();

        let ids: Vec<_> = stored.iter().map(|n| n.id).collect();
        let recipients: Vec<_> = stored.iter().map(|n| n.recipient_id.clone()).collect();
        let senders: Vec<_> = stored.iter().map(|n| n.sender_id.clone()).collect();
        let messages: Vec<_> = stored.iter().map(|n| n.message.clone()).collect();
        let actions: Vec<_> = stored.iter().map(|n| n.action_url.clone()).collect();
        let icons: Vec<_> = stored.iter().map(|n| n.icon_url.clone()).collect();
        let icon_actions: Vec<_> = stored.iter().map(|n| n.icon_action_url.clone()).collect();
        let created: Vec<_> = stored.iter().map(|n| n.created_at).collect();

        sqlx::query(
            "INSERT INTO notifications \
             (id, recipient_id, sender_id, message, action_url, icon_url, icon_action_url, is_read, created_at) \
             SELECT id, recipient_id, sender_id, message, action_url, icon_url, icon_action_url, false, created_at \
             FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], $8::timestamptz[]) \
             AS t(id, recipient_id, sender_id, message, action_url, icon_url, icon_action_url, created_at)",
        )
        .bind(ids)
        .bind(recipients)
        .bind(senders)
        .bind(messages)
        .bind(actions)
        .bind(icons)
        .bind(icon_actions)
        .bind(created)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(stored)
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE is_read = true AND created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_matches_pgvector_text_format() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn every_kind_maps_to_its_table() {
        let tables: Vec<_> = ContentKind::ALL.into_iter().map(table).collect();
        assert_eq!(tables, ["posts", "job_postings", "comments"]);
        assert_eq!(title_column(ContentKind::Comment), "'' AS title");
    }

    #[test]
    fn predicates_follow_stage_ownership() {
        assert_eq!(pending_predicate(Stage::Embedding), "embedding IS NULL");
        assert!(READY.contains("NOT is_deleted"));
    }
}
