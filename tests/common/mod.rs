//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;

use vocabot::bot::{Collaborators, ControllerSettings, InteractionController};
use vocabot::errors::BotError;
use vocabot::line::{ContentStream, ReplyGateway, ReplyMessage};
use vocabot::services::{
    AnalysisOutcome, ArchivedResult, ImageAnalyzer, NewArchiveRecord, ResultArchive, UploadReceipt,
    VocabularyExtractor, VocabularyUploader,
};
use vocabot::session::{SessionStore, Word};

pub const EXPIRY_SECS: u64 = 30 * 60;

#[derive(Default)]
pub struct FakeGateway {
    pub replies: Mutex<Vec<(String, Vec<ReplyMessage>)>>,
    pub content: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_replies: bool,
}

impl FakeGateway {
    pub fn failing() -> Self {
        Self {
            fail_replies: true,
            ..Default::default()
        }
    }

    pub fn with_content(self, content_id: &str, bytes: Vec<u8>) -> Self {
        self.content.lock().unwrap().insert(content_id.to_string(), bytes);
        self
    }

    pub fn replies(&self) -> Vec<(String, Vec<ReplyMessage>)> {
        self.replies.lock().unwrap().clone()
    }

    /// Preview of the only message of reply `index`
    pub fn reply_text(&self, index: usize) -> String {
        let replies = self.replies.lock().unwrap();
        assert_eq!(replies[index].1.len(), 1, "expected exactly one message per reply");
        replies[index].1[0].preview().to_string()
    }
}

#[async_trait]
impl ReplyGateway for FakeGateway {
    async fn reply(&self, reply_token: &str, messages: Vec<ReplyMessage>) -> Result<(), BotError> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), messages));
        if self.fail_replies {
            return Err(BotError::Delivery("reply token expired".to_string()));
        }
        Ok(())
    }

    async fn fetch_content(&self, content_id: &str) -> Result<ContentStream, BotError> {
        let Some(bytes) = self.content.lock().unwrap().get(content_id).cloned() else {
            return Err(BotError::Delivery(format!("content {content_id} not found")));
        };
        let chunks: Vec<Result<Bytes, BotError>> = bytes
            .chunks(4)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Answers by exact message text; anything else extracts nothing
#[derive(Default)]
pub struct FakeExtractor {
    pub answers: Mutex<HashMap<String, Result<Vec<Word>, BotError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn answer(self, text: &str, result: Result<Vec<Word>, BotError>) -> Self {
        self.answers.lock().unwrap().insert(text.to_string(), result);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VocabularyExtractor for FakeExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Word>, BotError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.answers
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct FakeAnalyzer {
    pub result: Result<AnalysisOutcome, BotError>,
    pub seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakeAnalyzer {
    pub fn new(result: Result<AnalysisOutcome, BotError>) -> Self {
        Self {
            result,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self::new(Ok(AnalysisOutcome::Questions(Vec::new())))
    }
}

#[async_trait]
impl ImageAnalyzer for FakeAnalyzer {
    async fn analyze(&self, image_path: &Path) -> Result<AnalysisOutcome, BotError> {
        let bytes = std::fs::read(image_path).unwrap_or_default();
        self.seen.lock().unwrap().push((image_path.to_path_buf(), bytes));
        self.result.clone()
    }
}

#[derive(Default)]
pub struct FakeUploader {
    pub fail: bool,
    pub uploads: Mutex<Vec<Vec<Word>>>,
}

impl FakeUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<Vec<Word>> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl VocabularyUploader for FakeUploader {
    async fn upload(&self, words: &[Word]) -> Result<UploadReceipt, BotError> {
        self.uploads.lock().unwrap().push(words.to_vec());
        if self.fail {
            return Err(BotError::Upload("app API returned 503 Service Unavailable".to_string()));
        }
        Ok(UploadReceipt {
            word_count: words.len(),
            dry_run: false,
            response: serde_json::json!({ "success": true }),
        })
    }

    async fn check_connection(&self) -> Result<(), BotError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeArchive {
    pub fail: bool,
    pub records: Mutex<Vec<NewArchiveRecord>>,
}

#[async_trait]
impl ResultArchive for FakeArchive {
    async fn append(&self, record: NewArchiveRecord) -> Result<ArchivedResult, BotError> {
        if self.fail {
            return Err(BotError::Archive("disk full".to_string()));
        }
        let stored = ArchivedResult {
            id: format!("id-{}", self.records.lock().unwrap().len()),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            subject: record.subject(),
            user_id: record.user_id.clone(),
            source_image_ref: record.source_image_ref.clone(),
            payload: Value::Null,
            status: "success".to_string(),
        };
        self.records.lock().unwrap().push(record);
        Ok(stored)
    }
}

/// Handles to every fake behind a controller
pub struct Harness {
    pub controller: Arc<InteractionController>,
    pub gateway: Arc<FakeGateway>,
    pub extractor: Arc<FakeExtractor>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub uploader: Arc<FakeUploader>,
    pub archive: Arc<FakeArchive>,
}

pub struct HarnessBuilder {
    pub gateway: FakeGateway,
    pub extractor: FakeExtractor,
    pub analyzer: FakeAnalyzer,
    pub uploader: FakeUploader,
    pub archive: FakeArchive,
    pub settings: ControllerSettings,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            gateway: FakeGateway::default(),
            extractor: FakeExtractor::default(),
            analyzer: FakeAnalyzer::default(),
            uploader: FakeUploader::default(),
            archive: FakeArchive::default(),
            settings: ControllerSettings::default(),
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let gateway = Arc::new(self.gateway);
        let extractor = Arc::new(self.extractor);
        let analyzer = Arc::new(self.analyzer);
        let uploader = Arc::new(self.uploader);
        let archive = Arc::new(self.archive);

        let controller = InteractionController::new(
            Collaborators {
                gateway: gateway.clone(),
                extractor: extractor.clone(),
                analyzer: analyzer.clone(),
                uploader: uploader.clone(),
                archive: archive.clone(),
            },
            Arc::new(SessionStore::new(std::time::Duration::from_secs(EXPIRY_SECS))),
            self.settings,
        );

        Harness {
            controller: Arc::new(controller),
            gateway,
            extractor,
            analyzer,
            uploader,
            archive,
        }
    }
}

pub fn cat_and_basement() -> Vec<Word> {
    vec![Word::new("cat", "貓"), Word::new("basement", "地下室")]
}
