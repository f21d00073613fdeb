//! Detoxify-style moderation service: `POST {text}` answers with one score
//! per category.

use async_trait::async_trait;
use domains::{DomainResult, ModerationAnalyzer, ModerationScores};
use serde::Serialize;

use crate::client::{AnalysisClient, ClientOptions};

#[derive(Serialize)]
struct ModerationRequest<'a> {
    text: &'a str,
}

pub struct HttpModerationAnalyzer {
    client: AnalysisClient,
    url: String,
}

impl HttpModerationAnalyzer {
    pub fn new(url: impl Into<String>, options: ClientOptions) -> DomainResult<Self> {
        Ok(Self { client: AnalysisClient::new(options)?, url: url.into() })
    }
}

#[async_trait]
impl ModerationAnalyzer for HttpModerationAnalyzer {
    async fn score(&self, text: &str) -> DomainResult<ModerationScores> {
        self.client.post_json(&self.url, &ModerationRequest { text }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::serve;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use domains::DomainError;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn scores_are_decoded() {
        let router = Router::new().route(
            "/moderate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["text"], "hello there");
                Json(json!({
                    "toxicity": 0.02, "severe_toxicity": 0.0, "obscene": 0.01, "threat": 0.0,
                    "insult": 0.01, "identity_attack": 0.0, "sexual_explicit": 0.0
                }))
            }),
        );
        let base = serve(router).await;

        let analyzer = HttpModerationAnalyzer::new(format!("{base}/moderate"), ClientOptions::new("moderation")).unwrap();
        let scores = analyzer.score("hello there").await.unwrap();
        assert!((scores.toxicity - 0.02).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn throttling_is_rate_limited() {
        let router = Router::new().route("/moderate", post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }));
        let base = serve(router).await;

        let analyzer = HttpModerationAnalyzer::new(format!("{base}/moderate"), ClientOptions::new("moderation")).unwrap();
        let err = analyzer.score("x").await.unwrap_err();
        assert!(matches!(err, DomainError::RateLimited(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_an_invalid_response() {
        let router = Router::new().route("/moderate", post(|| async { Json(json!({ "label": "toxic" })) }));
        let base = serve(router).await;

        let analyzer = HttpModerationAnalyzer::new(format!("{base}/moderate"), ClientOptions::new("moderation")).unwrap();
        let err = analyzer.score("x").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidResponse(_)));
    }
}
