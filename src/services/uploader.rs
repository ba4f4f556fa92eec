//! Downstream vocabulary stores: the app REST API, the WordBridge GraphQL
//! API, and a dry-run target for deployments without either.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{VocabularyUploader, USER_AGENT};
use crate::errors::BotError;
use crate::session::Word;

/// Largest batch accepted downstream
pub const MAX_UPLOAD_BATCH: usize = 100;

const APP_API_TIMEOUT: Duration = Duration::from_secs(10);
const WORDBRIDGE_TIMEOUT: Duration = Duration::from_secs(15);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const ADD_WORDS_MUTATION: &str = r#"
mutation AddWords($words: [WordInput!]!) {
  addWords(words: $words) {
    enUS
    zhTW
    __typename
  }
}
"#;

const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
  }
}
"#;

/// Acknowledgement of an accepted upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub word_count: usize,
    /// Nothing was sent downstream
    pub dry_run: bool,
    pub response: Value,
}

/// Checks a batch before it is sent anywhere
pub fn validate_upload_batch(words: &[Word]) -> Result<(), BotError> {
    if words.is_empty() {
        return Err(BotError::Upload("No words to upload".to_string()));
    }
    if words.len() > MAX_UPLOAD_BATCH {
        return Err(BotError::Upload(format!(
            "Too many words (max {MAX_UPLOAD_BATCH})"
        )));
    }
    if words
        .iter()
        .any(|word| word.source_word.trim().is_empty() || word.translation.trim().is_empty())
    {
        return Err(BotError::Upload("Word translations cannot be empty".to_string()));
    }
    Ok(())
}

fn build_client() -> Result<Client, BotError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {e}")))
}

async fn error_for_status(response: reqwest::Response, target: &str) -> Result<reqwest::Response, BotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(target_api = target, status = %status, body = %body, "Upload API error response");
    Err(BotError::Upload(format!("{target} returned {status}")))
}

/// Uploader for the app's `/api/vocabulary/upload` endpoint
pub struct AppApiUploader {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AppApiUploader {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, BotError> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl VocabularyUploader for AppApiUploader {
    async fn upload(&self, words: &[Word]) -> Result<UploadReceipt, BotError> {
        validate_upload_batch(words)?;
        info!(words = words.len(), "Uploading vocabulary to app API");

        let now = Utc::now().to_rfc3339();
        let payload = json!({
            "words": words,
            "source": "line_bot",
            "timestamp": now,
            "metadata": {
                "total_words": words.len(),
                "extracted_at": now,
            }
        });

        let response = self
            .authorized(self.http.post(format!("{}/api/vocabulary/upload", self.base_url)))
            .timeout(APP_API_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Upload))?;
        let response = error_for_status(response, "app API").await?;

        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        info!(words = words.len(), "App API accepted vocabulary");

        Ok(UploadReceipt {
            word_count: words.len(),
            dry_run: false,
            response: body,
        })
    }

    async fn check_connection(&self) -> Result<(), BotError> {
        let response = self
            .authorized(self.http.get(format!("{}/api/health", self.base_url)))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Upload))?;
        error_for_status(response, "app API").await.map(|_| ())
    }
}

/// Uploader for the WordBridge GraphQL API
pub struct WordBridgeUploader {
    http: Client,
    url: String,
}

impl WordBridgeUploader {
    pub fn new(url: impl Into<String>) -> Result<Self, BotError> {
        Ok(Self {
            http: build_client()?,
            url: url.into(),
        })
    }

    async fn post_graphql(&self, body: &Value, timeout: Duration) -> Result<Value, BotError> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "*/*")
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Upload))?;
        let response = error_for_status(response, "WordBridge").await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| BotError::from_reqwest(e, BotError::Upload))?;
        graphql_errors(&body)?;
        Ok(body)
    }
}

/// GraphQL reports failures in an `errors` array next to `data`
fn graphql_errors(body: &Value) -> Result<(), BotError> {
    match body.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => {
            let messages: Vec<&str> = errors
                .iter()
                .map(|error| error.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                .collect();
            Err(BotError::Upload(format!("GraphQL errors: {}", messages.join(", "))))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl VocabularyUploader for WordBridgeUploader {
    async fn upload(&self, words: &[Word]) -> Result<UploadReceipt, BotError> {
        validate_upload_batch(words)?;
        info!(words = words.len(), "Adding vocabulary words to WordBridge");

        let body = json!({
            "operationName": "AddWords",
            "query": ADD_WORDS_MUTATION,
            "variables": { "words": words },
        });
        let response = self.post_graphql(&body, WORDBRIDGE_TIMEOUT).await?;

        Ok(UploadReceipt {
            word_count: words.len(),
            dry_run: false,
            response: response.pointer("/data/addWords").cloned().unwrap_or(Value::Null),
        })
    }

    async fn check_connection(&self) -> Result<(), BotError> {
        let body = json!({ "query": INTROSPECTION_QUERY });
        self.post_graphql(&body, HEALTH_CHECK_TIMEOUT).await.map(|_| ())
    }
}

/// Accepts every valid batch without sending it anywhere
#[derive(Debug, Default)]
pub struct DryRunUploader;

#[async_trait]
impl VocabularyUploader for DryRunUploader {
    async fn upload(&self, words: &[Word]) -> Result<UploadReceipt, BotError> {
        validate_upload_batch(words)?;
        info!(words = words.len(), "No upload target configured, skipping upload");
        Ok(UploadReceipt {
            word_count: words.len(),
            dry_run: true,
            response: Value::Null,
        })
    }

    async fn check_connection(&self) -> Result<(), BotError> {
        Ok(())
    }
}
