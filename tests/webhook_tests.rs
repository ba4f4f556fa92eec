//! # Webhook Tests
//!
//! Webhook payload parsing and the HTTP router: signature checks, malformed
//! bodies, event dispatch, the health probe and the setup endpoint.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{cat_and_basement, FakeExtractor, HarnessBuilder};
use vocabot::events::{EventPayload, InboundEvent};
use vocabot::line::webhook::{sign, SIGNATURE_HEADER};
use vocabot::line::WebhookBody;
use vocabot::server::{build_router, AppState};

const SECRET: &str = "channel-secret";

fn webhook_request(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn text_event(user_id: &str, reply_token: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "replyToken": reply_token,
        "source": { "type": "user", "userId": user_id },
        "timestamp": 1700000000000u64,
        "message": { "id": "m1", "type": "text", "text": text }
    })
}

fn parse_events(body: Value) -> Vec<Option<InboundEvent>> {
    let body: WebhookBody = serde_json::from_value(body).unwrap();
    body.events.into_iter().map(|event| event.into_inbound()).collect()
}

#[test]
fn test_parse_supported_events() {
    let events = parse_events(json!({
        "destination": "Ubot",
        "events": [
            text_event("U1", "r1", "hello"),
            {
                "type": "message",
                "replyToken": "r2",
                "source": { "userId": "U2" },
                "message": { "id": "img-9", "type": "image" }
            },
            {
                "type": "postback",
                "replyToken": "r3",
                "source": { "userId": "U3" },
                "postback": { "data": "confirm" }
            }
        ]
    }));

    assert_eq!(
        events,
        vec![
            Some(InboundEvent::text("U1", "r1", "hello")),
            Some(InboundEvent::image("U2", "r2", "img-9")),
            Some(InboundEvent::postback("U3", "r3", "confirm")),
        ]
    );
}

#[test]
fn test_parse_ignores_unsupported_events() {
    let events = parse_events(json!({
        "events": [
            { "type": "follow", "replyToken": "r1", "source": { "userId": "U1" } },
            {
                "type": "message",
                "replyToken": "r2",
                "source": { "userId": "U1" },
                "message": { "id": "s1", "type": "sticker" }
            },
            {
                "type": "message",
                "source": { "userId": "U1" },
                "message": { "id": "m1", "type": "text", "text": "no token" }
            }
        ]
    }));

    assert_eq!(events, vec![None, None, None]);
}

#[test]
fn test_missing_user_becomes_unknown() {
    let events = parse_events(json!({
        "events": [{
            "type": "message",
            "replyToken": "r1",
            "source": { "type": "group", "groupId": "G1" },
            "message": { "id": "m1", "type": "text", "text": "hi" }
        }]
    }));

    let event = events[0].clone().unwrap();
    assert_eq!(event.user_id, "unknown");
    assert_eq!(event.payload, EventPayload::Text { text: "hi".to_string() });
}

#[tokio::test]
async fn test_webhook_rejects_missing_and_bad_signatures() {
    let harness = HarnessBuilder::default().build();
    let app = build_router(AppState::new(harness.controller.clone(), SECRET));
    let body = json!({ "events": [text_event("U1", "r1", "hello")] }).to_string();

    let response = app.clone().oneshot(webhook_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = sign("another-secret", body.as_bytes());
    let response = app.oneshot(webhook_request(&body, Some(forged))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(harness.extractor.call_count(), 0);
    assert!(harness.gateway.replies().is_empty());
}

#[tokio::test]
async fn test_webhook_rejects_malformed_json() {
    let harness = HarnessBuilder::default().build();
    let app = build_router(AppState::new(harness.controller.clone(), SECRET));
    let body = "{not json";

    let response = app
        .oneshot(webhook_request(body, Some(sign(SECRET, body.as_bytes()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_dispatches_events_in_order() {
    let harness = HarnessBuilder {
        extractor: FakeExtractor::default().answer("I saw a cat", Ok(cat_and_basement())),
        ..Default::default()
    }
    .build();
    let app = build_router(AppState::new(harness.controller.clone(), SECRET));

    let body = json!({
        "destination": "Ubot",
        "events": [
            text_event("U1", "r1", "I saw a cat"),
            { "type": "unfollow", "source": { "userId": "U9" } },
            {
                "type": "postback",
                "replyToken": "r2",
                "source": { "userId": "U1" },
                "postback": { "data": "confirm" }
            }
        ]
    })
    .to_string();

    let response = app
        .oneshot(webhook_request(&body, Some(sign(SECRET, body.as_bytes()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");

    let tokens: Vec<String> = harness.gateway.replies().into_iter().map(|(token, _)| token).collect();
    assert_eq!(tokens, vec!["r1", "r2"]);
    assert_eq!(harness.uploader.uploads(), vec![cat_and_basement()]);
    assert!(harness.controller.sessions().is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = HarnessBuilder::default().build();
    let app = build_router(AppState::new(harness.controller.clone(), SECRET));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "OK");
    assert_eq!(health["message"], "LINE Vocabulary Bot is running");
    assert!(health["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_setup_endpoint_points_at_webhook() {
    let harness = HarnessBuilder::default().build();
    let app = build_router(AppState::new(harness.controller.clone(), SECRET));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("host", "bot.example.com:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let setup: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(setup["webhook_url"], "http://bot.example.com:3000/webhook");
    assert_eq!(setup["instructions"].as_array().unwrap().len(), 3);
    assert!(harness.gateway.replies().is_empty());
}
