//! Question recognition on stored images through the Gemini API.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{call_with_recovery, is_retryable, ImageAnalyzer, RetryableStatus};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{GeminiConfig, RecoveryConfig};
use crate::errors::BotError;
use crate::text_processing::strip_code_fences;

/// Bytes inspected to recognize the image format
const FORMAT_DETECTION_BYTES: usize = 32;
const MIN_FORMAT_BYTES: usize = 8;

const ANALYSIS_PROMPT: &str = r#"
請分析這張圖片。

首先，請判斷這張圖片是否包含「測驗題目」或「學習評量」。
如果圖片模糊不清、無法辨識文字、或是風景照、人物照等非題目圖片，請輸出一個包含 "error" 欄位的 JSON 物件，例如：{"error": "圖片不包含清晰的測驗題目"}。

如果是有效的題目圖片，請輸出一個 JSON 物件，格式如下：
{
  "questions": [
    {
      "subject": "科目分類 (國語, 數學, 自然, 社會, 英文)",
      "stem": "題幹文字",
      "options": ["選項1", "選項2"],
      "blanks": ["空格1答案"],
      "image_description": "圖片描述"
    }
  ]
}
options 僅在有選項時填寫；blanks 僅在填空題且能推斷空格答案時填寫；image_description 僅在題目包含圖片時填寫。

如果圖片中包含多個題目，請在 questions 陣列中列出。
請只輸出純 JSON 字串，不要包含 Markdown 格式標記 (如 ```json)。
"#;

/// One recognized question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default = "unknown_subject")]
    pub subject: String,
    #[serde(default)]
    pub stem: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub blanks: Vec<String>,
    #[serde(default, alias = "imageDescription")]
    pub image_description: String,
}

fn unknown_subject() -> String {
    "unknown".to_string()
}

/// Result of a completed analysis call
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Questions(Vec<Question>),
    /// The model looked at the image and reported why it holds no question
    Rejected(String),
}

/// Parse the model's answer: `{"questions": [...]}` or `{"error": "..."}`
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisOutcome, BotError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| BotError::Analysis(format!("Analyzer returned invalid JSON: {e}")))?;

    if let Some(error) = value.get("error") {
        let reason = match error {
            Value::String(reason) => reason.clone(),
            other => other.to_string(),
        };
        return Ok(AnalysisOutcome::Rejected(reason));
    }

    match value.get("questions") {
        Some(questions @ Value::Array(_)) => {
            let questions: Vec<Question> = serde_json::from_value(questions.clone())
                .map_err(|e| BotError::Analysis(format!("Malformed question list: {e}")))?;
            Ok(AnalysisOutcome::Questions(questions))
        }
        _ => Err(BotError::Analysis(
            "Analyzer result has neither questions nor error".to_string(),
        )),
    }
}

/// MIME type of a supported image, detected from its leading bytes
pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < MIN_FORMAT_BYTES {
        return None;
    }
    let head = &bytes[..bytes.len().min(FORMAT_DETECTION_BYTES)];
    match image::guess_format(head).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Gif => Some("image/gif"),
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Analyzer backed by Gemini `generateContent`
pub struct GeminiAnalyzer {
    http: Client,
    config: GeminiConfig,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig, recovery: RecoveryConfig) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(recovery.operation_timeout())
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            breaker: CircuitBreaker::new("gemini", &recovery),
            config,
            recovery,
        })
    }

    async fn generate(&self, api_key: &str, body: &Value) -> Result<String, Result<RetryableStatus, BotError>> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Err(BotError::from_reqwest(e, BotError::Analysis)))?;

        let status = response.status();
        if is_retryable(status) {
            return Err(Ok(RetryableStatus(status)));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "Gemini request rejected");
            return Err(Err(BotError::Analysis(format!("Gemini returned {status}"))));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Err(BotError::from_reqwest(e, BotError::Analysis)))?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Err(BotError::Analysis("Gemini response contained no text".to_string())))
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, image_path: &Path) -> Result<AnalysisOutcome, BotError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(BotError::Config("GEMINI_API_KEY is not set".to_string()));
        };

        let image = tokio::fs::read(image_path)
            .await
            .map_err(|e| BotError::Analysis(format!("Failed to read {}: {e}", image_path.display())))?;
        let mime_type = detect_mime_type(&image)
            .ok_or_else(|| BotError::Analysis("Unsupported image format".to_string()))?;

        info!(
            image = %image_path.display(),
            bytes = image.len(),
            mime_type,
            "Analyzing image"
        );

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": ANALYSIS_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": STANDARD.encode(&image) } }
                ]
            }]
        });

        let body = &body;
        let text = call_with_recovery(&self.breaker, &self.recovery, BotError::Analysis, move || {
            self.generate(api_key, body)
        })
        .await?;

        parse_analysis_response(&text)
    }
}
