//! # analysis-adapters
//!
//! HTTP clients for the moderation, tagging and embedding collaborators.
//! Each client waits on a client-side rate limiter before every call and maps
//! failures onto `DomainError` so the consumer runtime can tell transient
//! from permanent. Retries are the broker's job, not the client's.

pub mod client;
pub mod embedding;
pub mod moderation;
pub mod tagging;

pub use client::{AnalysisClient, ClientOptions};
pub use embedding::OllamaEmbeddingGenerator;
pub use moderation::HttpModerationAnalyzer;
pub use tagging::HttpTagExtractor;
