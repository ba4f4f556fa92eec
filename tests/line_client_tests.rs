//! # LINE Client Tests
//!
//! The reply gateway against a local stand-in for the LINE API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vocabot::errors::BotError;
use vocabot::line::{LineClient, ReplyGateway, ReplyMessage};

#[derive(Clone, Default)]
struct Recorded {
    replies: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn reply(State(recorded): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let rejected = body["replyToken"] == "expired";
    recorded.replies.lock().unwrap().push((auth, body));
    if rejected {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

async fn content(Path(id): Path<String>) -> Result<Vec<u8>, StatusCode> {
    match id.as_str() {
        "img-1" => Ok((0..=255u8).cycle().take(10_000).collect()),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn start_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/v2/bot/message/reply", post(reply))
        .route("/v2/bot/message/:id/content", get(content))
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), recorded)
}

fn client(base: &str) -> LineClient {
    LineClient::with_endpoints("channel-token", Duration::from_secs(5), base, base).unwrap()
}

#[tokio::test]
async fn test_reply_posts_line_message_json() {
    let (base, recorded) = start_server().await;

    client(&base)
        .reply("token-1", vec![ReplyMessage::text("hello")])
        .await
        .unwrap();

    let replies = recorded.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0.as_deref(), Some("Bearer channel-token"));
    assert_eq!(
        replies[0].1,
        json!({ "replyToken": "token-1", "messages": [{ "type": "text", "text": "hello" }] })
    );
}

#[tokio::test]
async fn test_rejected_reply_is_delivery_error() {
    let (base, _recorded) = start_server().await;

    let result = client(&base)
        .reply("expired", vec![ReplyMessage::text("hello")])
        .await;

    assert!(matches!(result, Err(BotError::Delivery(_))));
}

#[tokio::test]
async fn test_too_many_messages_are_rejected_locally() {
    let (base, recorded) = start_server().await;
    let messages = (0..6).map(|i| ReplyMessage::text(format!("m{i}"))).collect();

    let result = client(&base).reply("token-1", messages).await;

    assert!(matches!(result, Err(BotError::Delivery(_))));
    assert!(recorded.replies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_content_streams_bytes() {
    let (base, _recorded) = start_server().await;

    let mut stream = client(&base).fetch_content("img-1").await.unwrap();
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(bytes.len(), 10_000);
    assert_eq!(bytes[256], 0);
    assert_eq!(bytes[257], 1);
}

#[tokio::test]
async fn test_missing_content_is_delivery_error() {
    let (base, _recorded) = start_server().await;

    let result = client(&base).fetch_content("gone").await;

    assert!(matches!(result, Err(BotError::Delivery(_))));
}
