//! External collaborators: AI extraction and analysis, vocabulary upload and
//! the result archive.
//!
//! The controller only sees the traits defined here; concrete providers are
//! chosen in `main` from configuration.

pub mod analyzer;
pub mod archive;
pub mod extractor;
pub mod uploader;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use tracing::warn;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::errors::BotError;
use crate::session::Word;

pub use analyzer::{AnalysisOutcome, GeminiAnalyzer, Question};
pub use archive::{ArchivedResult, JsonFileArchive, NewArchiveRecord};
pub use extractor::{KeywordExtractor, OpenAiExtractor};
pub use uploader::{AppApiUploader, DryRunUploader, UploadReceipt, WordBridgeUploader};

pub const USER_AGENT: &str = "LINE-Vocabulary-Bot/1.0";

/// Free text in, vocabulary out (possibly empty)
#[async_trait]
pub trait VocabularyExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<Word>, BotError>;
}

/// Stored image in, questions or a rejection reason out
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_path: &Path) -> Result<AnalysisOutcome, BotError>;
}

/// Pushes confirmed vocabulary downstream; one call succeeds or fails as a whole
#[async_trait]
pub trait VocabularyUploader: Send + Sync {
    async fn upload(&self, words: &[Word]) -> Result<UploadReceipt, BotError>;

    /// Probe the downstream service
    async fn check_connection(&self) -> Result<(), BotError>;
}

/// Append-only store of analysis results
#[async_trait]
pub trait ResultArchive: Send + Sync {
    async fn append(&self, record: NewArchiveRecord) -> Result<ArchivedResult, BotError>;
}

/// An HTTP response status worth retrying
#[derive(Debug)]
pub(crate) struct RetryableStatus(pub StatusCode);

pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Calculate exponential backoff delay with jitter
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exponential.min(config.max_retry_delay_ms);
    // up to 25% jitter so concurrent users don't retry in lockstep
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped.saturating_sub(jitter))
}

/// Run `call` behind the circuit breaker, retrying retryable statuses
///
/// `call` returns `Err(Ok(status))` for a retryable HTTP status and
/// `Err(Err(error))` for a final failure.
pub(crate) async fn call_with_recovery<T, F, Fut>(
    breaker: &CircuitBreaker,
    config: &RecoveryConfig,
    wrap: fn(String) -> BotError,
    mut call: F,
) -> Result<T, BotError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Result<RetryableStatus, BotError>>>,
{
    if breaker.is_open() {
        return Err(BotError::CircuitOpen(format!(
            "{} is temporarily unavailable",
            breaker.name()
        )));
    }

    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(Ok(RetryableStatus(status))) if attempt < config.max_retries => {
                let delay = calculate_retry_delay(attempt, config);
                warn!(
                    provider = breaker.name(),
                    status = %status,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying provider call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(Ok(RetryableStatus(status))) => {
                breaker.record_failure();
                return Err(wrap(format!("{} returned {status}", breaker.name())));
            }
            Err(Err(error)) => {
                breaker.record_failure();
                return Err(error);
            }
        }
    }
}
