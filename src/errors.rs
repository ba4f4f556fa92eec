//! # Bot Error Types Module
//!
//! This module defines the error types returned by the bot's collaborators:
//! the AI services, the vocabulary uploader, the result archive and the
//! messaging platform gateway.

/// Failures produced at the collaborator boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// Vocabulary extraction failed or returned a malformed structure
    Extraction(String),
    /// Downstream vocabulary upload failed
    Upload(String),
    /// Image analysis failed or violated the result contract
    Analysis(String),
    /// Result archive could not be read or written
    Archive(String),
    /// Reply or content fetch against the messaging platform failed
    Delivery(String),
    /// A collaborator call did not finish in time
    Timeout(String),
    /// Calls are short-circuited after repeated failures
    CircuitOpen(String),
    /// Invalid or missing configuration
    Config(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Extraction(msg) => write!(f, "Extraction error: {msg}"),
            BotError::Upload(msg) => write!(f, "Upload error: {msg}"),
            BotError::Analysis(msg) => write!(f, "Analysis error: {msg}"),
            BotError::Archive(msg) => write!(f, "Archive error: {msg}"),
            BotError::Delivery(msg) => write!(f, "Delivery error: {msg}"),
            BotError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            BotError::CircuitOpen(msg) => write!(f, "Circuit open: {msg}"),
            BotError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for BotError {}

impl From<anyhow::Error> for BotError {
    fn from(err: anyhow::Error) -> Self {
        BotError::Extraction(err.to_string())
    }
}

impl BotError {
    /// Map a transport error, keeping timeouts distinguishable
    pub fn from_reqwest(err: reqwest::Error, wrap: fn(String) -> BotError) -> Self {
        if err.is_timeout() {
            BotError::Timeout(err.to_string())
        } else {
            wrap(err.to_string())
        }
    }
}
