//! # Moderation Consumer
//!
//! Scores the item's text and sets `is_processed`. A negative verdict also
//! records a report, soft-deletes the item and raises `ContentRemoved` so the
//! author gets told.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    ContentKind, ContentRemoved, ContentStore, DomainEvent, DomainEventSink, DomainResult, MessageHandler,
    ModerationAnalyzer, ModerationReport, ModerationThresholds, PipelineMessage, Stage, StageMessage, Topic,
};
use tracing::{error, info, warn};

use super::{stage_payload, still_pending};

pub struct ModerationConsumer {
    store: Arc<dyn ContentStore>,
    analyzer: Arc<dyn ModerationAnalyzer>,
    events: Arc<dyn DomainEventSink>,
    thresholds: ModerationThresholds,
}

impl ModerationConsumer {
    pub fn new(
        store: Arc<dyn ContentStore>,
        analyzer: Arc<dyn ModerationAnalyzer>,
        events: Arc<dyn DomainEventSink>,
        thresholds: ModerationThresholds,
    ) -> Self {
        Self { store, analyzer, events, thresholds }
    }

    async fn remove(&self, payload: &StageMessage, report: ModerationReport) -> DomainResult<()> {
        let (kind, id) = (payload.kind, payload.content_id.as_str());

        // 1. Report first: upserted, so a retry after a later failure is harmless
        self.store.save_moderation_report(&report).await?;

        // 2. Take the item out of every scan and close the stage together
        self.store.remove_moderated(kind, id).await?;

        warn!(%kind, content_id = id, author_id = %payload.author_id, "content removed by moderation");

        // 3. The item is already settled; a lost event only costs the notification
        let event = DomainEvent::ContentRemoved(ContentRemoved {
            kind,
            content_id: payload.content_id.clone(),
            author_id: payload.author_id.clone(),
            excerpt: excerpt(payload),
            reason: report.reason,
        });
        if let Err(err) = self.events.publish(event).await {
            error!(%kind, content_id = id, error = %err, "failed to raise content removed event");
        }
        Ok(())
    }
}

/// What the author sees of the removed item.
fn excerpt(payload: &StageMessage) -> String {
    match payload.kind {
        ContentKind::Comment => payload.content.clone(),
        ContentKind::Post | ContentKind::JobPosting => payload.title.clone(),
    }
}

#[async_trait]
impl MessageHandler for ModerationConsumer {
    fn topic(&self) -> Topic {
        Topic::Moderation
    }

    async fn handle(&self, message: &PipelineMessage) -> DomainResult<()> {
        let payload = stage_payload(message, Stage::Moderation)?;
        if !still_pending(self.store.as_ref(), Stage::Moderation, payload).await? {
            return Ok(());
        }

        let scores = self.analyzer.score(&payload.text()).await?;

        if self.thresholds.is_negative(&scores) {
            let report = ModerationReport::negative(payload.kind, &payload.content_id, &payload.author_id, scores);
            return self.remove(payload, report).await;
        }

        self.store.mark_processed(payload.kind, &payload.content_id).await?;
        info!(kind = %payload.kind, content_id = %payload.content_id, "content passed moderation");
        Ok(())
    }
}
