//! HTTP surface: the LINE webhook and a health probe.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HOST, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::bot::InteractionController;
use crate::line::webhook::SIGNATURE_HEADER;
use crate::line::{verify_signature, WebhookBody};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<InteractionController>,
    pub channel_secret: Arc<str>,
}

impl AppState {
    pub fn new(controller: Arc<InteractionController>, channel_secret: impl Into<Arc<str>>) -> Self {
        Self {
            controller,
            channel_secret: channel_secret.into(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/test", get(setup_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("Webhook request without signature");
        return (StatusCode::UNAUTHORIZED, "Missing signature");
    };
    if !verify_signature(&state.channel_secret, &body, signature) {
        warn!("Webhook signature mismatch");
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Malformed webhook body");
            return (StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    info!(events = payload.events.len(), "Webhook received");
    for inbound in payload.events.into_iter().filter_map(|event| event.into_inbound()) {
        state.controller.handle_event(inbound).await;
    }

    (StatusCode::OK, "OK")
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "message": "LINE Vocabulary Bot is running",
    }))
}

/// Setup hints for pointing the LINE channel at this server
async fn setup_handler(headers: HeaderMap) -> impl IntoResponse {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    Json(json!({
        "message": "LINE Vocabulary Bot Test Endpoint",
        "webhook_url": format!("http://{host}/webhook"),
        "instructions": [
            "1. Set your LINE Bot webhook URL to the webhook_url above",
            "2. Send a message to your LINE Bot",
            "3. Check the logs for received messages",
        ],
    }))
}
