//! LINE reply and content API client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{ContentStream, ReplyGateway, ReplyMessage};
use crate::errors::BotError;

pub const DEFAULT_API_BASE: &str = "https://api.line.me";
pub const DEFAULT_DATA_API_BASE: &str = "https://api-data.line.me";

/// LINE accepts at most five messages per reply
const MAX_MESSAGES_PER_REPLY: usize = 5;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [ReplyMessage],
}

/// Reply gateway backed by the LINE Messaging API
pub struct LineClient {
    http: Client,
    channel_access_token: String,
    api_base: String,
    data_api_base: String,
}

impl LineClient {
    pub fn new(channel_access_token: impl Into<String>, timeout: Duration) -> Result<Self, BotError> {
        Self::with_endpoints(channel_access_token, timeout, DEFAULT_API_BASE, DEFAULT_DATA_API_BASE)
    }

    /// Client against custom API hosts
    pub fn with_endpoints(
        channel_access_token: impl Into<String>,
        timeout: Duration,
        api_base: impl Into<String>,
        data_api_base: impl Into<String>,
    ) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            channel_access_token: channel_access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            data_api_base: data_api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReplyGateway for LineClient {
    async fn reply(&self, reply_token: &str, messages: Vec<ReplyMessage>) -> Result<(), BotError> {
        if messages.is_empty() {
            return Ok(());
        }
        if messages.len() > MAX_MESSAGES_PER_REPLY {
            return Err(BotError::Delivery(format!(
                "{} messages exceed the per-reply limit of {MAX_MESSAGES_PER_REPLY}",
                messages.len()
            )));
        }

        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&ReplyRequest {
                reply_token,
                messages: &messages,
            })
            .send()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Delivery))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Delivery(format!("reply rejected with {status}: {body}")));
        }

        debug!(messages = messages.len(), "Reply delivered");
        Ok(())
    }

    async fn fetch_content(&self, content_id: &str) -> Result<ContentStream, BotError> {
        let url = format!("{}/v2/bot/message/{content_id}/content", self.data_api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.channel_access_token)
            .send()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Delivery))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Delivery(format!(
                "content {content_id} unavailable: {status}"
            )));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| BotError::from_reqwest(e, BotError::Delivery)));
        Ok(stream.boxed())
    }
}
