//! LINE Webhook Receiver
//!
//! Inbound payloads from the LINE Messaging API: signature validation and
//! conversion of webhook events into [`InboundEvent`]s.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::events::InboundEvent;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

const UNKNOWN_USER: &str = "unknown";

/// Validates the `x-line-signature` header against the channel secret
///
/// The signature is the base64 HMAC-SHA256 of the raw request body.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature LINE sends for `body`
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    pub message: Option<MessageContent>,
    pub postback: Option<PostbackContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageContent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostbackContent {
    pub data: String,
}

impl WebhookEvent {
    /// Convert into an inbound event; `None` for events the bot ignores
    pub fn into_inbound(self) -> Option<InboundEvent> {
        let Some(reply_token) = self.reply_token.filter(|token| !token.is_empty()) else {
            debug!(event_type = %self.event_type, "Ignoring event without reply token");
            return None;
        };
        let user_id = self
            .source
            .and_then(|source| source.user_id)
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        match (self.event_type.as_str(), self.message, self.postback) {
            ("message", Some(message), _) => match message.kind.as_str() {
                "text" => Some(InboundEvent::text(user_id, reply_token, message.text.unwrap_or_default())),
                "image" => Some(InboundEvent::image(user_id, reply_token, message.id)),
                other => {
                    debug!(message_type = other, "Ignoring unsupported message type");
                    None
                }
            },
            ("postback", _, Some(postback)) => Some(InboundEvent::postback(user_id, reply_token, postback.data)),
            (other, _, _) => {
                debug!(event_type = other, "Ignoring event type");
                None
            }
        }
    }
}
