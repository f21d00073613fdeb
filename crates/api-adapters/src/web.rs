//! # HTTP Surface
//!
//! - `GET /health`
//! - `GET /metrics`: OpenMetrics text of the shared registry
//! - `GET /notifications/stream`: server-sent events for the user named in
//!   the `x-user-id` header, set by the gateway in front of the worker

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::hub::{ConnectionHub, Subscription};

pub const USER_HEADER: &str = "x-user-id";

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub registry: Arc<Registry>,
    /// Ends open event streams on shutdown
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/notifications/stream", get(notification_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until the state's shutdown token is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    info!(addr = ?listener.local_addr().ok(), "http server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    if let Err(err) = encode(&mut body, &state.registry) {
        error!(error = %err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response()
}

async fn notification_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(user_id) = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing user identity" }))).into_response();
    };

    let subscription = state.hub.subscribe(user_id);
    debug!(user_id = %subscription.user_id, connection_id = subscription.connection_id, "event stream opened");

    Sse::new(events(subscription, state.shutdown.clone()))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
        .into_response()
}

/// The stream owns the subscription, so a closed client connection
/// unregisters it from the hub.
fn events(subscription: Subscription, shutdown: CancellationToken) -> impl Stream<Item = Result<Event, Infallible>> {
    subscription
        .take_until(shutdown.cancelled_owned())
        .filter_map(|notification| async move {
            match Event::default().event("notification").id(notification.id.to_string()).json_data(&notification) {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    warn!(notification_id = %notification.id, error = %err, "failed to encode notification");
                    None
                }
            }
        })
}
