//! # User Interest Consumer
//!
//! Embeds a profile's interest tags as one text so job postings can be
//! matched against it.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{
    DomainError, DomainResult, EmbeddingGenerator, MessageHandler, PipelineMessage, ProfileStore, Topic,
};
use tracing::{debug, info};

use super::embedding::check_dimensions;

pub struct UserInterestConsumer {
    profiles: Arc<dyn ProfileStore>,
    generator: Arc<dyn EmbeddingGenerator>,
    dimensions: usize,
}

impl UserInterestConsumer {
    pub fn new(profiles: Arc<dyn ProfileStore>, generator: Arc<dyn EmbeddingGenerator>, dimensions: usize) -> Self {
        Self { profiles, generator, dimensions }
    }
}

#[async_trait]
impl MessageHandler for UserInterestConsumer {
    fn topic(&self) -> Topic {
        Topic::UserInterests
    }

    async fn handle(&self, message: &PipelineMessage) -> DomainResult<()> {
        let PipelineMessage::RefreshInterests(payload) = message else {
            return Err(DomainError::UnexpectedMessage(format!(
                "user interest consumer received a {} message",
                message.topic()
            )));
        };

        let tags = match self.profiles.interest_tags(&payload.profile_id).await? {
            Some(tags) if !tags.is_empty() => tags,
            _ => {
                debug!(profile_id = %payload.profile_id, "profile has no interests, acknowledging");
                return Ok(());
            }
        };

        let embedding = self.generator.embed(&tags.join(", ")).await?;
        check_dimensions(&embedding, self.dimensions)?;
        self.profiles.set_interest_embedding(&payload.profile_id, &embedding).await?;
        info!(profile_id = %payload.profile_id, interests = tags.len(), "interest embedding stored");
        Ok(())
    }
}
