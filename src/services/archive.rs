//! Append-only JSON file archive of analysis results.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::{Question, ResultArchive};
use crate::errors::BotError;

pub const STATUS_SUCCESS: &str = "success";

/// What the image flow hands to the archive
#[derive(Debug, Clone)]
pub struct NewArchiveRecord {
    pub user_id: String,
    pub source_image_ref: String,
    pub questions: Vec<Question>,
}

impl NewArchiveRecord {
    /// Distinct subjects in first-seen order, comma separated
    pub fn subject(&self) -> String {
        let mut subjects: Vec<&str> = Vec::new();
        for question in &self.questions {
            if !subjects.contains(&question.subject.as_str()) {
                subjects.push(&question.subject);
            }
        }
        subjects.join(", ")
    }
}

/// One stored analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedResult {
    pub id: String,
    pub timestamp: String,
    pub subject: String,
    pub user_id: String,
    pub source_image_ref: String,
    pub payload: Value,
    pub status: String,
}

/// Archive kept as one JSON array in a file
///
/// Each append reads the whole array, adds the record, writes a temp file
/// next to the original and renames it into place. Appends from this process
/// are serialized; other processes must not write the same file.
pub struct JsonFileArchive {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record
    pub async fn read_all(&self) -> Result<Vec<ArchivedResult>, BotError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .map_err(|e| BotError::Archive(format!("Archive task failed: {e}")))?
    }
}

fn archive_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create the directory and an empty array file when missing
fn initialize_storage(path: &Path) -> Result<(), BotError> {
    let dir = archive_dir(path);
    std::fs::create_dir_all(dir)
        .map_err(|e| BotError::Archive(format!("Failed to create {}: {e}", dir.display())))?;

    if !path.exists() {
        std::fs::write(path, "[]")
            .map_err(|e| BotError::Archive(format!("Failed to create {}: {e}", path.display())))?;
        info!(path = %path.display(), "Created result archive file");
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<ArchivedResult>, BotError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| BotError::Archive(format!("Failed to read {}: {e}", path.display())))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .map_err(|e| BotError::Archive(format!("Archive {} is not a JSON array of results: {e}", path.display())))
}

fn write_records(path: &Path, records: &[ArchivedResult]) -> Result<(), BotError> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| BotError::Archive(format!("Failed to serialize archive: {e}")))?;

    let mut temp = NamedTempFile::new_in(archive_dir(path))
        .map_err(|e| BotError::Archive(format!("Failed to create temp file: {e}")))?;
    temp.write_all(json.as_bytes())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| BotError::Archive(format!("Failed to write temp file: {e}")))?;
    temp.persist(path)
        .map_err(|e| BotError::Archive(format!("Failed to replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

fn append_record(path: &Path, record: NewArchiveRecord) -> Result<ArchivedResult, BotError> {
    initialize_storage(path)?;
    let mut records = read_records(path)?;

    let stored = ArchivedResult {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        subject: record.subject(),
        user_id: record.user_id,
        source_image_ref: record.source_image_ref,
        payload: serde_json::json!({ "questions": record.questions }),
        status: STATUS_SUCCESS.to_string(),
    };
    records.push(stored.clone());
    write_records(path, &records)?;

    Ok(stored)
}

#[async_trait]
impl ResultArchive for JsonFileArchive {
    async fn append(&self, record: NewArchiveRecord) -> Result<ArchivedResult, BotError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let question_count = record.questions.len();

        let stored = tokio::task::spawn_blocking(move || append_record(&path, record))
            .await
            .map_err(|e| BotError::Archive(format!("Archive task failed: {e}")))??;

        info!(
            id = %stored.id,
            questions = question_count,
            subject = %stored.subject,
            "Saved analysis result"
        );
        Ok(stored)
    }
}
