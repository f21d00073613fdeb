//! Properties that must hold for any content item, whatever order or how
//! often the pipeline touches it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    ContentFlags, ContentItem, ContentKind, ContentSnapshot, ContentStore, DomainError, DomainResult, MessageBroker,
    ModerationReport, ModerationThresholds, PipelineMessage, Stage, Topic, EMBEDDING_DIMENSIONS,
};
use integration_tests::{embedder, safe_analyzer, tagger, toxic_analyzer, Harness};
use services::{ContentScanner, Delivery, ModerationConsumer, ScanReport};
use storage_adapters::{InMemoryBroker, InMemoryStore};
use tokio_test::assert_ok;

fn visible_only_when_ready(item: &ContentItem) -> bool {
    !item.is_safe_content || (item.is_processed && item.is_tagged && item.embedding.is_some())
}

fn item_with(processed: bool, tagged: bool, embedded: bool) -> ContentItem {
    let mut item = ContentItem::new(ContentKind::Post, "author-1", "t", "c");
    item.is_processed = processed;
    item.is_tagged = tagged;
    item.embedding = embedded.then(|| vec![0.1; EMBEDDING_DIMENSIONS]);
    item
}

#[tokio::test]
async fn finalizer_sets_visibility_only_for_complete_items() {
    let harness = Harness::new();
    let mut items = Vec::new();
    for processed in [false, true] {
        for tagged in [false, true] {
            for embedded in [false, true] {
                let item = item_with(processed, tagged, embedded);
                harness.store.insert_content(item.clone());
                items.push(item);
            }
        }
    }

    assert_eq!(assert_ok!(harness.finalizer().finalize().await), 1);

    for item in &items {
        let stored = harness.store.content(item.kind, &item.id).unwrap();
        let complete = item.is_processed && item.is_tagged && item.embedding.is_some();
        assert_eq!(stored.is_safe_content, complete, "flags {:?}", item.flags());
        assert!(visible_only_when_ready(&stored));
    }
}

#[tokio::test]
async fn handling_a_message_twice_matches_handling_it_once() {
    let mut harness = Harness::new();
    let groups = harness.groups(toxic_analyzer(), tagger(&["Rust"]), embedder());
    let post = ContentItem::new(ContentKind::Post, "author-1", "Spam spam spam", "buy now");
    harness.store.insert_content(post.clone());

    let message = PipelineMessage::for_stage(Stage::Moderation, post.snapshot());
    groups.moderation.process(message.clone()).await;
    let once = harness.store.content(ContentKind::Post, &post.id).unwrap();
    let report = harness.store.report_for(ContentKind::Post, &post.id).unwrap();

    groups.moderation.process(message).await;
    let twice = harness.store.content(ContentKind::Post, &post.id).unwrap();

    assert_eq!(once, twice);
    assert_eq!(harness.store.report_count(), 1);
    assert_eq!(harness.store.report_for(ContentKind::Post, &post.id).unwrap(), report);
    assert_eq!(harness.queued_notifications().len(), 1);
}

#[tokio::test]
async fn tagging_twice_keeps_the_first_tags() {
    let harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&["Rust"]), embedder());
    let post = ContentItem::new(ContentKind::Post, "author-1", "Traits", "object safety");
    harness.store.insert_content(post.clone());

    let message = PipelineMessage::for_stage(Stage::Tagging, post.snapshot());
    groups.tagging.process(message.clone()).await;
    groups.tagging.process(message).await;

    assert_eq!(harness.store.content(ContentKind::Post, &post.id).unwrap().tags, ["rust"]);
}

#[tokio::test]
async fn flags_never_go_back() {
    let harness = Harness::new();
    let groups = harness.groups(safe_analyzer(), tagger(&["Rust"]), embedder());
    let items: Vec<ContentItem> = (0..3)
        .map(|i| ContentItem::new(ContentKind::ALL[i], format!("author-{i}"), "title", "body"))
        .collect();
    for item in &items {
        harness.store.insert_content(item.clone());
    }

    let mut previous: Vec<ContentFlags> = items.iter().map(ContentItem::flags).collect();
    let check = |previous: &mut Vec<ContentFlags>| {
        for (item, before) in items.iter().zip(previous.iter_mut()) {
            let stored = harness.store.content(item.kind, &item.id).unwrap();
            let now = stored.flags();
            assert!(!before.is_processed || now.is_processed);
            assert!(!before.is_tagged || now.is_tagged);
            assert!(!before.has_embedding || now.has_embedding);
            assert!(!before.is_safe_content || now.is_safe_content);
            assert!(visible_only_when_ready(&stored));
            *before = now;
        }
    };

    // every stage (and the finalizer) twice, in an order that differs per round
    for round in [[Stage::Tagging, Stage::Moderation, Stage::Embedding], Stage::ALL] {
        for stage in round {
            for kind in ContentKind::ALL {
                harness.run_stage(&groups, kind, stage).await;
            }
            check(&mut previous);
            assert_ok!(harness.finalizer().finalize().await);
            check(&mut previous);
        }
    }
    assert!(previous.iter().all(|flags| flags.is_safe_content));
}

/// Delegates to the in-memory broker but refuses one content item.
struct RefusingBroker {
    inner: InMemoryBroker,
    refused_id: String,
}

#[async_trait]
impl MessageBroker for RefusingBroker {
    async fn publish(&self, message: &PipelineMessage) -> DomainResult<()> {
        if message.subject_id() == self.refused_id {
            return Err(DomainError::Broker("connection reset".into()));
        }
        self.inner.publish(message).await
    }

    async fn receive(&self, topic: Topic) -> DomainResult<Option<PipelineMessage>> {
        self.inner.receive(topic).await
    }

    async fn park(&self, message: &PipelineMessage, reason: &str) -> DomainResult<()> {
        self.inner.park(message, reason).await
    }
}

#[tokio::test]
async fn one_failed_dispatch_does_not_stop_the_scan() {
    let store = Arc::new(InMemoryStore::new());
    let items: Vec<ContentItem> =
        (0..5).map(|i| ContentItem::new(ContentKind::JobPosting, "recruiter", format!("job {i}"), "")).collect();
    for item in &items {
        store.insert_content(item.clone());
    }
    let broker = Arc::new(RefusingBroker { inner: InMemoryBroker::new(), refused_id: items[2].id.clone() });
    let harness = Harness::new();
    let scanner = ContentScanner::new(store.clone(), broker.clone(), 2, harness.metrics.clone());

    let report = assert_ok!(scanner.scan_and_dispatch(ContentKind::JobPosting, Stage::Moderation).await);
    assert_eq!(report, ScanReport { found: 5, dispatched: 4, failed: 1 });

    let mut dispatched: Vec<String> = broker
        .inner
        .drain(Topic::Moderation)
        .await
        .iter()
        .map(|message| message.subject_id().to_string())
        .collect();
    dispatched.sort();
    let mut expected: Vec<String> =
        items.iter().filter(|item| item.id != items[2].id).map(|item| item.id.clone()).collect();
    expected.sort();
    assert_eq!(dispatched, expected);

    // the refused item is still pending, so the next scan picks it up
    let flags = assert_ok!(store.get_flags(ContentKind::JobPosting, &items[2].id).await).unwrap();
    assert!(Stage::Moderation.is_pending(&flags));
}

/// Delegates to the in-memory store but fails the first removal write.
struct FlakyRemovalStore {
    inner: Arc<InMemoryStore>,
    failed_once: AtomicBool,
}

#[async_trait]
impl ContentStore for FlakyRemovalStore {
    async fn find_pending(&self, kind: ContentKind, stage: Stage) -> DomainResult<Vec<ContentSnapshot>> {
        self.inner.find_pending(kind, stage).await
    }

    async fn get_flags(&self, kind: ContentKind, id: &str) -> DomainResult<Option<ContentFlags>> {
        self.inner.get_flags(kind, id).await
    }

    async fn mark_processed(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        self.inner.mark_processed(kind, id).await
    }

    async fn apply_tags(&self, kind: ContentKind, id: &str, tags: &[String]) -> DomainResult<()> {
        self.inner.apply_tags(kind, id, tags).await
    }

    async fn set_embedding(&self, kind: ContentKind, id: &str, embedding: &[f32]) -> DomainResult<()> {
        self.inner.set_embedding(kind, id, embedding).await
    }

    async fn remove_moderated(&self, kind: ContentKind, id: &str) -> DomainResult<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(DomainError::Store("connection reset during update".into()));
        }
        self.inner.remove_moderated(kind, id).await
    }

    async fn save_moderation_report(&self, report: &ModerationReport) -> DomainResult<()> {
        self.inner.save_moderation_report(report).await
    }

    async fn finalize_visibility(&self) -> DomainResult<u64> {
        self.inner.finalize_visibility().await
    }
}

#[tokio::test]
async fn removal_interrupted_by_a_store_failure_completes_on_retry() {
    let mut harness = Harness::new();
    let store = Arc::new(FlakyRemovalStore { inner: harness.store.clone(), failed_once: AtomicBool::new(false) });
    let analyzer = toxic_analyzer();
    let group = harness.group(Arc::new(ModerationConsumer::new(
        store,
        Arc::new(analyzer),
        harness.facade.clone(),
        ModerationThresholds::default(),
    )));
    let post = ContentItem::new(ContentKind::Post, "author-1", "Spam spam spam", "buy now");
    harness.store.insert_content(post.clone());

    let delivery = group.process(PipelineMessage::for_stage(Stage::Moderation, post.snapshot())).await;
    assert_eq!(delivery, Delivery::Handled { attempts: 2 });

    let stored = harness.store.content(ContentKind::Post, &post.id).unwrap();
    assert!(stored.is_removed);
    assert!(stored.is_processed);
    assert_eq!(harness.store.report_count(), 1);

    let queued = harness.queued_notifications();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].recipient_id, "author-1");
    assert!(queued[0].message.starts_with("Your post was removed"));
}
