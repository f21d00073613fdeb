//! # Embedding Consumer
//!
//! Stores the item's vector. Job postings are then matched against profile
//! interest embeddings and matching candidates are told about the job.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    ContentKind, ContentStore, DomainError, DomainEvent, DomainEventSink, DomainResult, EmbeddingGenerator,
    JobMatched, MessageHandler, PipelineMessage, ProfileStore, Stage, StageMessage, Topic,
};
use tracing::{debug, error, info};

use super::{stage_payload, still_pending};

pub struct EmbeddingConsumer {
    store: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileStore>,
    generator: Arc<dyn EmbeddingGenerator>,
    events: Arc<dyn DomainEventSink>,
    dimensions: usize,
    match_max_distance: f32,
}

impl EmbeddingConsumer {
    pub fn new(
        store: Arc<dyn ContentStore>,
        profiles: Arc<dyn ProfileStore>,
        generator: Arc<dyn EmbeddingGenerator>,
        events: Arc<dyn DomainEventSink>,
        dimensions: usize,
        match_max_distance: f32,
    ) -> Self {
        Self { store, profiles, generator, events, dimensions, match_max_distance }
    }

    async fn match_candidates(&self, payload: &StageMessage, embedding: &[f32]) -> DomainResult<()> {
        let candidate_ids: Vec<String> = self
            .profiles
            .find_interest_matches(embedding, self.match_max_distance)
            .await?
            .into_iter()
            .filter(|id| *id != payload.author_id)
            .collect();

        if candidate_ids.is_empty() {
            debug!(job_posting_id = %payload.content_id, "no matching candidates");
            return Ok(());
        }

        info!(job_posting_id = %payload.content_id, candidates = candidate_ids.len(), "job matched candidates");
        self.events
            .publish(DomainEvent::JobMatched(JobMatched {
                job_posting_id: payload.content_id.clone(),
                author_id: payload.author_id.clone(),
                title: payload.title.clone(),
                candidate_ids,
            }))
            .await
    }
}

/// Rejects vectors of the wrong width before they reach the store.
pub(crate) fn check_dimensions(embedding: &[f32], dimensions: usize) -> DomainResult<()> {
    if embedding.len() != dimensions {
        return Err(DomainError::InvalidResponse(format!(
            "expected a {dimensions}-dimension embedding, got {}",
            embedding.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl MessageHandler for EmbeddingConsumer {
    fn topic(&self) -> Topic {
        Topic::Embedding
    }

    async fn handle(&self, message: &PipelineMessage) -> DomainResult<()> {
        let payload = stage_payload(message, Stage::Embedding)?;
        if !still_pending(self.store.as_ref(), Stage::Embedding, payload).await? {
            return Ok(());
        }

        let embedding = self.generator.embed(&payload.text()).await?;
        check_dimensions(&embedding, self.dimensions)?;
        self.store.set_embedding(payload.kind, &payload.content_id, &embedding).await?;
        info!(kind = %payload.kind, content_id = %payload.content_id, "content embedded");

        // The stage is done at this point; matching is best-effort.
        if payload.kind == ContentKind::JobPosting {
            if let Err(err) = self.match_candidates(payload, &embedding).await {
                error!(job_posting_id = %payload.content_id, error = %err, "job matching failed");
            }
        }
        Ok(())
    }
}
