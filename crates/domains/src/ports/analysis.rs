//! External analysis collaborators. All of them sit behind provider-side
//! rate limits, which is why work reaches them through the broker.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::models::ModerationScores;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ModerationAnalyzer: Send + Sync {
    async fn score(&self, text: &str) -> DomainResult<ModerationScores>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagExtractor: Send + Sync {
    async fn extract_tags(&self, title: &str, content: &str) -> DomainResult<Vec<String>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Fixed-dimension vector for `text`.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;
}
