//! # Tagging Consumer

use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    ContentStore, DomainError, DomainResult, MessageHandler, PipelineMessage, Stage, TagExtractor, Topic,
};
use tracing::info;

use super::{stage_payload, still_pending};

/// Extracts tags and writes them together with `is_tagged`.
pub struct TaggingConsumer {
    store: Arc<dyn ContentStore>,
    extractor: Arc<dyn TagExtractor>,
}

impl TaggingConsumer {
    pub fn new(store: Arc<dyn ContentStore>, extractor: Arc<dyn TagExtractor>) -> Self {
        Self { store, extractor }
    }
}

/// Trims, lowercases and dedupes, keeping first-seen order.
fn normalize(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[async_trait]
impl MessageHandler for TaggingConsumer {
    fn topic(&self) -> Topic {
        Topic::Tagging
    }

    async fn handle(&self, message: &PipelineMessage) -> DomainResult<()> {
        let payload = stage_payload(message, Stage::Tagging)?;
        if !still_pending(self.store.as_ref(), Stage::Tagging, payload).await? {
            return Ok(());
        }

        let tags = normalize(self.extractor.extract_tags(&payload.title, &payload.content).await?);
        if tags.is_empty() {
            return Err(DomainError::InvalidResponse(format!(
                "no tags extracted for {} {}",
                payload.kind, payload.content_id
            )));
        }

        self.store.apply_tags(payload.kind, &payload.content_id, &tags).await?;
        info!(kind = %payload.kind, content_id = %payload.content_id, tags = tags.len(), "content tagged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{ContentFlags, ContentItem, ContentKind, MockContentStore, MockTagExtractor};

    fn message() -> PipelineMessage {
        let job = ContentItem::new(ContentKind::JobPosting, "a", "Senior Rust Engineer", "tokio, axum, postgres");
        PipelineMessage::for_stage(Stage::Tagging, job.snapshot())
    }

    fn pending_store() -> MockContentStore {
        let mut store = MockContentStore::new();
        store.expect_get_flags().returning(|_, _| Ok(Some(ContentFlags::default())));
        store
    }

    #[test]
    fn normalize_dedupes_case_insensitively() {
        let tags = normalize(vec![" Rust ".into(), "rust".into(), "".into(), "Tokio".into()]);
        insta::assert_debug_snapshot!(tags, @r###"
        [
            "rust",
            "tokio",
        ]
        "###);
    }

    #[tokio::test]
    async fn tags_are_applied_in_one_write() {
        let mut store = pending_store();
        store
            .expect_apply_tags()
            .withf(|kind, _, tags| *kind == ContentKind::JobPosting && tags == ["rust", "backend"])
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut extractor = MockTagExtractor::new();
        extractor
            .expect_extract_tags()
            .returning(|_, _| Ok(vec!["Rust".into(), "Backend".into()]));

        TaggingConsumer::new(Arc::new(store), Arc::new(extractor)).handle(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_tag_list_is_an_invalid_response() {
        let mut store = pending_store();
        store.expect_apply_tags().never();
        let mut extractor = MockTagExtractor::new();
        extractor.expect_extract_tags().returning(|_, _| Ok(vec!["  ".into()]));

        let err = TaggingConsumer::new(Arc::new(store), Arc::new(extractor))
            .handle(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidResponse(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn tagged_item_is_skipped() {
        let mut store = MockContentStore::new();
        store
            .expect_get_flags()
            .returning(|_, _| Ok(Some(ContentFlags { is_tagged: true, ..Default::default() })));
        let mut extractor = MockTagExtractor::new();
        extractor.expect_extract_tags().never();

        TaggingConsumer::new(Arc::new(store), Arc::new(extractor)).handle(&message()).await.unwrap();
    }
}
