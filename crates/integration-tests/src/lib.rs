//! # integration-tests
//!
//! A harness that wires the real services against the in-memory adapters,
//! with mocked analysis collaborators. Messages are pulled off the broker and
//! handed to the consumer groups explicitly, so every test controls exactly
//! when each stage runs.

use std::sync::Arc;
use std::time::Duration;

use domains::{
    ContentKind, DomainError, MessageHandler, MockEmbeddingGenerator, MockModerationAnalyzer, MockTagExtractor,
    ModerationScores, ModerationThresholds, NewNotification, Stage, Topic, EMBEDDING_DIMENSIONS,
};
use services::notifications::NotificationReceiver;
use services::{
    notification_channel, ConsumerGroup, ContentScanner, Delivery, EmbeddingConsumer, ModerationConsumer,
    NotificationFacade, PipelineMetrics, RetryPolicy, TaggingConsumer, UserInterestConsumer, VisibilityFinalizer,
};
use storage_adapters::{InMemoryBroker, InMemoryStore};

/// Cosine distance under which a profile matches a job posting.
pub const MATCH_MAX_DISTANCE: f32 = 0.5;

pub fn safe_analyzer() -> MockModerationAnalyzer {
    let mut analyzer = MockModerationAnalyzer::new();
    analyzer.expect_score().returning(|_| Ok(ModerationScores::default()));
    analyzer
}

pub fn toxic_analyzer() -> MockModerationAnalyzer {
    let mut analyzer = MockModerationAnalyzer::new();
    analyzer
        .expect_score()
        .returning(|_| Ok(ModerationScores { toxicity: 0.97, insult: 0.91, ..Default::default() }));
    analyzer
}

pub fn tagger(tags: &[&str]) -> MockTagExtractor {
    let tags: Vec<String> = tags.iter().map(|tag| tag.to_string()).collect();
    let mut extractor = MockTagExtractor::new();
    extractor.expect_extract_tags().returning(move |_, _| Ok(tags.clone()));
    extractor
}

/// Every text embeds to the same unit-ish vector, so every profile with an
/// interest embedding from this generator matches.
pub fn embedder() -> MockEmbeddingGenerator {
    let mut generator = MockEmbeddingGenerator::new();
    generator.expect_embed().returning(|_| Ok(vec![0.1; EMBEDDING_DIMENSIONS]));
    generator
}

pub fn unavailable_embedder() -> MockEmbeddingGenerator {
    let mut generator = MockEmbeddingGenerator::new();
    generator
        .expect_embed()
        .returning(|_| Err(DomainError::Unavailable("ollama: connection refused".into())));
    generator
}

/// One consumer group per topic.
pub struct Groups {
    pub moderation: ConsumerGroup,
    pub tagging: ConsumerGroup,
    pub embedding: ConsumerGroup,
    pub user_interests: ConsumerGroup,
}

impl Groups {
    pub fn for_topic(&self, topic: Topic) -> &ConsumerGroup {
        match topic {
            Topic::Moderation => &self.moderation,
            Topic::Tagging => &self.tagging,
            Topic::Embedding => &self.embedding,
            Topic::UserInterests => &self.user_interests,
        }
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub broker: Arc<InMemoryBroker>,
    pub metrics: PipelineMetrics,
    pub facade: Arc<NotificationFacade>,
    /// Batches handed off by the facade, not yet delivered
    pub outbox: NotificationReceiver,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let (sender, outbox) = notification_channel();
        Self {
            store: Arc::new(InMemoryStore::new()),
            broker: Arc::new(InMemoryBroker::new()),
            metrics: PipelineMetrics::new(),
            facade: Arc::new(NotificationFacade::new(sender)),
            outbox,
        }
    }

    pub fn scanner(&self) -> ContentScanner {
        ContentScanner::new(self.store.clone(), self.broker.clone(), 2, self.metrics.clone())
    }

    pub fn finalizer(&self) -> VisibilityFinalizer {
        VisibilityFinalizer::new(self.store.clone(), Duration::from_secs(60), self.metrics.clone())
    }

    /// Consumer groups with a retry interval short enough for tests.
    pub fn groups(
        &self,
        analyzer: MockModerationAnalyzer,
        extractor: MockTagExtractor,
        generator: MockEmbeddingGenerator,
    ) -> Groups {
        let generator = Arc::new(generator);
        Groups {
            moderation: self.group(Arc::new(ModerationConsumer::new(
                self.store.clone(),
                Arc::new(analyzer),
                self.facade.clone(),
                ModerationThresholds::default(),
            ))),
            tagging: self.group(Arc::new(TaggingConsumer::new(self.store.clone(), Arc::new(extractor)))),
            embedding: self.group(Arc::new(EmbeddingConsumer::new(
                self.store.clone(),
                self.store.clone(),
                generator.clone(),
                self.facade.clone(),
                EMBEDDING_DIMENSIONS,
                MATCH_MAX_DISTANCE,
            ))),
            user_interests: self.group(Arc::new(UserInterestConsumer::new(
                self.store.clone(),
                generator,
                EMBEDDING_DIMENSIONS,
            ))),
        }
    }

    /// A group on the harness broker for any handler, with the test retry policy.
    pub fn group(&self, handler: Arc<dyn MessageHandler>) -> ConsumerGroup {
        let retry = RetryPolicy { retries: 2, interval: Duration::from_millis(5) };
        ConsumerGroup::new(self.broker.clone(), handler, 2, retry, self.metrics.clone())
    }

    /// Hands every queued message on `topic` to its group, one by one.
    pub async fn pump(&self, groups: &Groups, topic: Topic) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for message in self.broker.drain(topic).await {
            deliveries.push(groups.for_topic(topic).process(message).await);
        }
        deliveries
    }

    /// Scans `kind` for `stage` and runs the resulting messages.
    pub async fn run_stage(&self, groups: &Groups, kind: ContentKind, stage: Stage) -> Vec<Delivery> {
        let scanner = self.scanner();
        if let Err(err) = scanner.scan_and_dispatch(kind, stage).await {
            panic!("scan of {kind} for {stage} failed: {err}");
        }
        let topic = match stage {
            Stage::Moderation => Topic::Moderation,
            Stage::Tagging => Topic::Tagging,
            Stage::Embedding => Topic::Embedding,
        };
        self.pump(groups, topic).await
    }

    /// Every batch the facade has handed off so far.
    pub fn queued_notifications(&mut self) -> Vec<NewNotification> {
        let mut queued = Vec::new();
        while let Ok(batch) = self.outbox.try_recv() {
            queued.extend(batch);
        }
        queued
    }
}
