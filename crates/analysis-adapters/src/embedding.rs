//! Ollama `/api/embed`.

use async_trait::async_trait;
use domains::{DomainError, DomainResult, EmbeddingGenerator};
use serde::{Deserialize, Serialize};

use crate::client::{AnalysisClient, ClientOptions};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbeddingGenerator {
    client: AnalysisClient,
    url: String,
    model: String,
}

impl OllamaEmbeddingGenerator {
    /// `endpoint` is the Ollama base URL, e.g. `http://localhost:11434`.
    pub fn new(endpoint: &str, model: impl Into<String>, options: ClientOptions) -> DomainResult<Self> {
        Ok(Self {
            client: AnalysisClient::new(options)?,
            url: format!("{}/api/embed", endpoint.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingGenerator for OllamaEmbeddingGenerator {
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        let request = EmbedRequest { model: &self.model, input: text };
        let response: EmbedResponse = self.client.post_json(&self.url, &request).await?;
        response
            .embeddings
            .into_iter()
            .next()
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| DomainError::InvalidResponse(format!("{} returned no embedding", self.model)))
    }
}
