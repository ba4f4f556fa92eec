//! Vocabulary extraction: an OpenAI chat-completions client and an offline
//! keyword fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{call_with_recovery, is_retryable, RetryableStatus, VocabularyExtractor};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{OpenAiConfig, RecoveryConfig};
use crate::errors::BotError;
use crate::session::Word;
use crate::text_processing::{extract_candidate_words, strip_code_fences};

const SYSTEM_PROMPT: &str = "You are a vocabulary extraction and translation assistant. \
Extract English vocabulary words from the given text and provide accurate Traditional Chinese (Taiwan) translations. \
Return only valid JSON in the specified format.";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1000;

/// Words returned by the offline extractor
pub const KEYWORD_LIMIT: usize = 10;

/// User prompt sent along with the message text
pub fn build_prompt(message_text: &str) -> String {
    format!(
        r#"Please extract English vocabulary words from the following text and provide Traditional Chinese (Taiwan) translations.

Text: "{message_text}"

Requirements:
1. Extract only English words that are suitable for vocabulary learning
2. Provide accurate Traditional Chinese (Taiwan) translations
3. Exclude common words like "the", "a", "an", "is", "are", "and", "or", "but", etc.
4. Focus on meaningful vocabulary words (nouns, verbs, adjectives, adverbs)
5. If no suitable vocabulary words are found, return an empty words array

Return the result in this exact JSON format:
{{
  "words": [
    {{ "enUS": "word1", "zhTW": "翻譯1" }},
    {{ "enUS": "word2", "zhTW": "翻譯2" }}
  ]
}}

Only return the JSON, no additional text or explanation."#
    )
}

#[derive(Debug, Deserialize)]
struct VocabularyResponse {
    words: Vec<Word>,
}

/// Parse and validate the model's answer
///
/// The answer must be `{"words": [...]}` where every entry has non-blank
/// `enUS` and `zhTW` strings. An empty array is valid.
pub fn parse_vocabulary_response(raw: &str) -> Result<Vec<Word>, BotError> {
    let cleaned = strip_code_fences(raw);
    let response: VocabularyResponse = serde_json::from_str(&cleaned)
        .map_err(|e| BotError::Extraction(format!("Invalid vocabulary data structure from AI: {e}")))?;

    if let Some(blank) = response
        .words
        .iter()
        .find(|word| word.source_word.trim().is_empty() || word.translation.trim().is_empty())
    {
        return Err(BotError::Extraction(format!(
            "Vocabulary entry with blank field: {blank:?}"
        )));
    }

    Ok(response.words)
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Extractor backed by the OpenAI chat-completions API
pub struct OpenAiExtractor {
    http: Client,
    config: OpenAiConfig,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl OpenAiExtractor {
    pub fn new(config: OpenAiConfig, recovery: RecoveryConfig) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(recovery.operation_timeout())
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            breaker: CircuitBreaker::new("openai", &recovery),
            config,
            recovery,
        })
    }

    async fn request_completion(&self, text: &str) -> Result<String, Result<RetryableStatus, BotError>> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(text) }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Err(BotError::from_reqwest(e, BotError::Extraction)))?;

        let status = response.status();
        if is_retryable(status) {
            return Err(Ok(RetryableStatus(status)));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, detail = %detail, "OpenAI request rejected");
            return Err(Err(BotError::Extraction(format!("OpenAI returned {status}"))));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Err(BotError::from_reqwest(e, BotError::Extraction)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Err(BotError::Extraction("OpenAI response contained no message".to_string())))
    }
}

#[async_trait]
impl VocabularyExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Word>, BotError> {
        let content = call_with_recovery(&self.breaker, &self.recovery, BotError::Extraction, move || {
            self.request_completion(text)
        })
        .await?;
        debug!(response = %content, "AI vocabulary response");

        let words = parse_vocabulary_response(&content)?;
        info!(words = words.len(), "Vocabulary extracted");
        Ok(words)
    }
}

/// Offline extractor used when no AI provider is configured
///
/// Picks uncommon words from the text; the translation is a `[word]`
/// placeholder.
#[derive(Debug, Default)]
pub struct KeywordExtractor;

#[async_trait]
impl VocabularyExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Word>, BotError> {
        let words: Vec<Word> = extract_candidate_words(text, KEYWORD_LIMIT)
            .into_iter()
            .map(|word| {
                let placeholder = format!("[{word}]");
                Word::new(word, placeholder)
            })
            .collect();
        debug!(words = words.len(), "Keyword extraction completed");
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let raw = r#"{"words":[{"enUS":"cat","zhTW":"貓"},{"enUS":"basement","zhTW":"地下室"}]}"#;
        let words = parse_vocabulary_response(raw).unwrap();
        assert_eq!(words, vec![Word::new("cat", "貓"), Word::new("basement", "地下室")]);
    }

    #[test]
    fn test_parse_fenced_and_empty_response() {
        let raw = "```json\n{\"words\": []}\n```";
        assert_eq!(parse_vocabulary_response(raw).unwrap(), vec![]);
    }

    #[test]
    fn test_parse_rejects_malformed_structures() {
        assert!(parse_vocabulary_response("not json").is_err());
        assert!(parse_vocabulary_response(r#"{"vocabulary": []}"#).is_err());
        assert!(parse_vocabulary_response(r#"{"words": [{"enUS": "cat"}]}"#).is_err());
        assert!(parse_vocabulary_response(r#"{"words": [{"enUS": "cat", "zhTW": 3}]}"#).is_err());
        assert!(parse_vocabulary_response(r#"{"words": [{"enUS": " ", "zhTW": "貓"}]}"#).is_err());
    }

    #[test]
    fn test_prompt_embeds_text() {
        let prompt = build_prompt("I saw a cat");
        assert!(prompt.contains("Text: \"I saw a cat\""));
        assert!(prompt.contains("\"enUS\": \"word1\""));
    }

    #[tokio::test]
    async fn test_keyword_extractor() {
        let words = KeywordExtractor.extract("The elephant and the giraffe").await.unwrap();
        assert_eq!(
            words,
            vec![Word::new("elephant", "[elephant]"), Word::new("giraffe", "[giraffe]")]
        );
    }
}
