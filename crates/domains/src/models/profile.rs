//! # Profiles and Embeddings

use serde::{Deserialize, Serialize};

/// Output width of the embedding model the pipeline is configured against.
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// A user profile as far as interest matching is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub interest_tags: Vec<String>,
    pub interest_embedding: Option<Vec<f32>>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            interest_tags: Vec::new(),
            interest_embedding: None,
        }
    }
}

/// Cosine distance (`1 - cosine similarity`), in `0..=2`.
///
/// Returns `None` for mismatched lengths or zero vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
}
