//! LINE Messaging API adapter
//!
//! - `client`: outbound replies and message content downloads
//! - `webhook`: inbound webhook payloads and signature validation

pub mod client;
pub mod webhook;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::errors::BotError;
use crate::text_processing::truncate_for_line;

pub use client::LineClient;
pub use webhook::{verify_signature, WebhookBody, WebhookEvent};

/// Chunks of a downloaded message attachment
pub type ContentStream = BoxStream<'static, Result<Bytes, BotError>>;

/// One outbound message, serialized in the platform's message JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    Text {
        text: String,
    },
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: serde_json::Value,
    },
}

impl ReplyMessage {
    /// Text message cut to the platform's length limit
    pub fn text(text: impl AsRef<str>) -> Self {
        ReplyMessage::Text {
            text: truncate_for_line(text.as_ref()),
        }
    }

    /// Text shown in chat lists and notifications
    pub fn preview(&self) -> &str {
        match self {
            ReplyMessage::Text { text } => text,
            ReplyMessage::Flex { alt_text, .. } => alt_text,
        }
    }
}

/// Outbound delivery and attachment access on the messaging platform
#[async_trait]
pub trait ReplyGateway: Send + Sync {
    /// Answer an event; a reply token can be used once
    async fn reply(&self, reply_token: &str, messages: Vec<ReplyMessage>) -> Result<(), BotError>;

    /// Stream the binary content of a received message
    async fn fetch_content(&self, content_id: &str) -> Result<ContentStream, BotError>;
}
