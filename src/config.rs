//! # Bot Configuration Module
//!
//! This module defines the configuration structures for the bot: platform
//! credentials, AI provider settings, downstream upload targets, storage
//! paths, session lifetime and recovery settings.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

// Constants for bot configuration
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_STORAGE_PATH: &str = "./temp";
pub const DEFAULT_OCR_STORAGE_PATH: &str = "./storage/ocr-results.json";
pub const DEFAULT_SESSION_EXPIRY_SECS: u64 = 30 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
pub const DEFAULT_LANGUAGE: &str = "en";

/// Recovery configuration for calls to external services
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single request in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 4000,
            operation_timeout_secs: 20, // reply tokens expire after about a minute
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

impl RecoveryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// How the bot answers a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Ask for confirmation, then upload on `confirm`
    #[default]
    Confirm,
    /// Reply with the extracted list only
    Echo,
}

impl FromStr for ReplyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "confirm" => Ok(ReplyMode::Confirm),
            "echo" => Ok(ReplyMode::Echo),
            other => Err(anyhow!("unknown reply mode: {other}")),
        }
    }
}

/// LINE channel credentials
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub channel_access_token: String,
    pub channel_secret: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Where confirmed vocabulary goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    WordBridge { url: String },
    AppApi { base_url: String, api_key: Option<String> },
    DryRun,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory receiving downloaded images
    pub image_dir: PathBuf,
    /// JSON file holding archived analysis results
    pub archive_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub expiry: Duration,
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(DEFAULT_SESSION_EXPIRY_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub port: u16,
    pub line: LineConfig,
    /// `None` selects the offline keyword extractor
    pub openai: Option<OpenAiConfig>,
    pub gemini: GeminiConfig,
    pub upload: UploadTarget,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub reply_mode: ReplyMode,
    pub language: String,
    pub recovery: RecoveryConfig,
}

impl BotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let line = LineConfig {
            channel_access_token: require("LINE_CHANNEL_ACCESS_TOKEN")?,
            channel_secret: require("LINE_CHANNEL_SECRET")?,
        };

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        let gemini = GeminiConfig {
            api_key: get("GEMINI_API_KEY"),
            base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        };

        let upload = match (get("WORDBRIDGE_API_URL"), get("APP_API_BASE_URL")) {
            (Some(url), _) => UploadTarget::WordBridge { url },
            (None, Some(base_url)) if !is_placeholder_url(&base_url) => UploadTarget::AppApi {
                base_url,
                api_key: get("APP_API_KEY"),
            },
            _ => UploadTarget::DryRun,
        };

        let storage = StorageConfig {
            image_dir: PathBuf::from(
                get("IMAGE_STORAGE_PATH").unwrap_or_else(|| DEFAULT_IMAGE_STORAGE_PATH.to_string()),
            ),
            archive_file: PathBuf::from(
                get("OCR_STORAGE_PATH").unwrap_or_else(|| DEFAULT_OCR_STORAGE_PATH.to_string()),
            ),
        };

        let session = SessionConfig {
            expiry: Duration::from_secs(parse_or(
                "SESSION_EXPIRY_SECS",
                get("SESSION_EXPIRY_SECS"),
                DEFAULT_SESSION_EXPIRY_SECS,
            )?),
            sweep_interval: Duration::from_secs(parse_or(
                "SESSION_SWEEP_INTERVAL_SECS",
                get("SESSION_SWEEP_INTERVAL_SECS"),
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?),
        };
        if session.sweep_interval.is_zero() {
            return Err(anyhow!("SESSION_SWEEP_INTERVAL_SECS must be greater than zero"));
        }

        let reply_mode = match get("REPLY_MODE") {
            Some(mode) => mode.parse().context("Invalid REPLY_MODE")?,
            None => ReplyMode::default(),
        };

        Ok(Self {
            port,
            line,
            openai,
            gemini,
            upload,
            storage,
            session,
            reply_mode,
            language: get("BOT_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            recovery: RecoveryConfig::default(),
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw.parse().with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}

/// Local and example hosts are treated as "no downstream configured"
fn is_placeholder_url(url: &str) -> bool {
    url.contains("localhost") || url.contains("example.com")
}
