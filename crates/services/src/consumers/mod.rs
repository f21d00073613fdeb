//! # Stage Consumers
//!
//! One handler per broker topic. Each handler writes only the field its stage
//! owns and checks current state first, so redelivered or duplicated messages
//! are acknowledged without calling the analysis collaborator again.

pub mod embedding;
pub mod moderation;
pub mod tagging;
pub mod user_interest;

pub use embedding::EmbeddingConsumer;
pub use moderation::ModerationConsumer;
pub use tagging::TaggingConsumer;
pub use user_interest::UserInterestConsumer;

use domains::{ContentStore, DomainError, DomainResult, PipelineMessage, Stage, StageMessage};
use tracing::debug;

/// The stage payload of `message`, or an error if it belongs to another topic.
pub(crate) fn stage_payload(message: &PipelineMessage, stage: Stage) -> DomainResult<&StageMessage> {
    match (stage, message) {
        (Stage::Moderation, PipelineMessage::Moderate(payload))
        | (Stage::Tagging, PipelineMessage::Tag(payload))
        | (Stage::Embedding, PipelineMessage::Embed(payload)) => Ok(payload),
        _ => Err(DomainError::UnexpectedMessage(format!(
            "{} consumer received a {} message",
            stage,
            message.topic()
        ))),
    }
}

/// Whether `stage` still has work to do for the item. Missing, removed and
/// already-finished items are all reported as not pending.
pub(crate) async fn still_pending(store: &dyn ContentStore, stage: Stage, payload: &StageMessage) -> DomainResult<bool> {
    let pending = match store.get_flags(payload.kind, &payload.content_id).await? {
        Some(flags) => stage.is_pending(&flags),
        None => false,
    };
    if !pending {
        debug!(
            %stage,
            kind = %payload.kind,
            content_id = %payload.content_id,
            "nothing to do, acknowledging"
        );
    }
    Ok(pending)
}
