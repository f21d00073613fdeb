//! Shared HTTP plumbing: one `reqwest::Client`, one limiter per collaborator.

use std::num::NonZeroU32;
use std::time::Duration;

use domains::{DomainError, DomainResult};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("bridge-worker/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub struct ClientOptions {
    pub name: &'static str,
    pub api_key: Option<SecretString>,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(name: &'static str) -> Self {
        Self { name, api_key: None, requests_per_minute: 30, timeout: Duration::from_secs(30) }
    }
}

pub struct AnalysisClient {
    name: &'static str,
    http: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    api_key: Option<SecretString>,
}

impl AnalysisClient {
    pub fn new(options: ClientOptions) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .map_err(|e| DomainError::Internal(format!("{} http client: {e}", options.name)))?;

        let per_minute = NonZeroU32::new(options.requests_per_minute)
            .ok_or_else(|| DomainError::Validation(format!("{} requests_per_minute must be positive", options.name)))?;

        Ok(Self {
            name: options.name,
            http,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            api_key: options.api_key,
        })
    }

    /// POSTs `body` as JSON and decodes the JSON answer.
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> DomainResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        // 1. Respect the provider ceiling
        self.limiter.until_ready().await;

        // 2. Send
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        // 3. Classify the status, then decode
        let status = response.status();
        debug!(client = self.name, %status, "analysis call returned");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.name, status, &body));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| DomainError::InvalidResponse(format!("{}: {e}", self.name)))
    }

    fn transport_error(&self, err: reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::Unavailable(format!("{} timed out", self.name))
        } else {
            DomainError::Unavailable(format!("{}: {err}", self.name))
        }
    }
}

/// 429 and 5xx are worth retrying; any other rejection is not.
pub(crate) fn status_error(name: &str, status: StatusCode, body: &str) -> DomainError {
    let detail = format!("{name} returned {status}: {}", body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        DomainError::RateLimited(detail)
    } else if status.is_server_error() {
        DomainError::Unavailable(detail)
    } else {
        DomainError::Validation(detail)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serves `router` on an ephemeral port; returns its base URL.
    pub(crate) async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn status_classification() {
        assert!(matches!(status_error("x", StatusCode::TOO_MANY_REQUESTS, ""), DomainError::RateLimited(_)));
        assert!(matches!(status_error("x", StatusCode::BAD_GATEWAY, ""), DomainError::Unavailable(_)));
        let rejected = status_error("x", StatusCode::UNPROCESSABLE_ENTITY, "bad input");
        assert!(matches!(rejected, DomainError::Validation(_)));
        assert!(!rejected.is_transient());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let options = ClientOptions { requests_per_minute: 0, ..ClientOptions::new("moderation") };
        assert!(AnalysisClient::new(options).is_err());
    }

    #[tokio::test]
    async fn unreachable_collaborator_is_unavailable() {
        let client = AnalysisClient::new(ClientOptions {
            timeout: Duration::from_millis(500),
            ..ClientOptions::new("moderation")
        })
        .unwrap();
        let err = client
            .post_json::<_, serde_json::Value>("http://127.0.0.1:1/moderate", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unavailable(_)));
    }
}
