//! Message Handler module for incoming text and image messages

use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::controller::{InteractionController, Outcome};
use super::ui_builder::{format_analysis_result, format_confirmation, format_error, format_plain_list};
use crate::config::ReplyMode;
use crate::errors::BotError;
use crate::line::{ContentStream, ReplyMessage};
use crate::localization::{t_args_lang, t_lang};
use crate::services::{AnalysisOutcome, NewArchiveRecord, Question};
use crate::session::{validate_word_list, PendingAction};

impl InteractionController {
    /// Extract vocabulary from a text message and ask for confirmation
    pub async fn handle_text(&self, user_id: &str, text: &str, reply_token: &str) -> Outcome {
        let language = self.language();

        if text.trim().is_empty() {
            debug!(user_id = %user_id, "Empty text message");
            self.send(user_id, reply_token, ReplyMessage::text(t_lang("text-no-vocabulary", language)))
                .await;
            return Outcome::NoVocabulary;
        }

        info!(user_id = %user_id, chars = text.chars().count(), "Processing text message");

        let extracted = match self.services.extractor.extract(text).await {
            Ok(words) => words,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Vocabulary extraction failed");
                self.send(user_id, reply_token, format_error(&t_lang("text-processing-error", language), language))
                    .await;
                return Outcome::ExtractionFailed;
            }
        };

        if extracted.is_empty() {
            info!(user_id = %user_id, "No vocabulary found in message");
            self.send(user_id, reply_token, ReplyMessage::text(t_lang("text-no-vocabulary", language)))
                .await;
            return Outcome::NoVocabulary;
        }

        let words = match validate_word_list(extracted) {
            Ok(words) => words,
            Err(reason) => {
                warn!(user_id = %user_id, reason, "Extractor returned an invalid word list");
                self.send(user_id, reply_token, format_error(&t_lang("text-processing-error", language), language))
                    .await;
                return Outcome::ExtractionFailed;
            }
        };
        let word_count = words.len();

        if self.settings.reply_mode == ReplyMode::Echo {
            let text = format!(
                "{}\n{}",
                format_plain_list(&words, language),
                t_lang("echo-complete", language)
            );
            self.send(user_id, reply_token, ReplyMessage::text(text)).await;
            return Outcome::Echoed { word_count };
        }

        let card = format_confirmation(&words, language).to_message();
        if self
            .sessions
            .insert(PendingAction::new(user_id, words, Utc::now()))
            .is_some()
        {
            debug!(user_id = %user_id, "Replaced previous pending action");
        }
        info!(user_id = %user_id, words = word_count, "Awaiting upload confirmation");

        self.send(user_id, reply_token, card).await;
        Outcome::AwaitingConfirmation { word_count }
    }

    /// Store a received image, analyze it and archive the recognized questions
    pub async fn handle_image(&self, user_id: &str, content_id: &str, reply_token: &str) -> Outcome {
        let language = self.language();

        let stored = match self.download_image(content_id).await {
            Ok(path) => path,
            Err(e) => {
                error!(user_id = %user_id, content_id, error = %e, "Failed to store image");
                let text = t_args_lang("image-error", &[("reason", &e.to_string())], language);
                self.send(user_id, reply_token, format_error(&text, language)).await;
                return Outcome::ImageFailed;
            }
        };
        info!(user_id = %user_id, path = %stored.display(), "Image saved");

        let questions = match self.services.analyzer.analyze(&stored).await {
            Ok(AnalysisOutcome::Questions(questions)) => questions,
            Ok(AnalysisOutcome::Rejected(reason)) => {
                info!(user_id = %user_id, reason = %reason, "Image holds no recognizable question");
                let text = t_args_lang("image-unrecognized", &[("reason", &reason)], language);
                self.send(user_id, reply_token, ReplyMessage::text(text)).await;
                return Outcome::ImageRejected;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Image analysis failed");
                let text = t_args_lang("image-error", &[("reason", &e.to_string())], language);
                self.send(user_id, reply_token, format_error(&text, language)).await;
                return Outcome::ImageFailed;
            }
        };
        let question_count = questions.len();
        let result = format_analysis_result(&questions);

        let archived = question_count > 0 && self.archive_result(user_id, &stored, questions).await;

        let text = if question_count > 0 {
            format!("{}\n\n{}", t_lang("image-saved", language), result)
        } else {
            result
        };
        self.send(user_id, reply_token, ReplyMessage::text(text)).await;

        Outcome::ImageAnalyzed {
            question_count,
            archived,
        }
    }

    /// Best effort; a failure is only logged
    async fn archive_result(&self, user_id: &str, image: &Path, questions: Vec<Question>) -> bool {
        let record = NewArchiveRecord {
            user_id: user_id.to_string(),
            source_image_ref: image.display().to_string(),
            questions,
        };
        match self.services.archive.append(record).await {
            Ok(stored) => {
                debug!(user_id = %user_id, id = %stored.id, "Analysis result archived");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to archive analysis result");
                false
            }
        }
    }

    async fn download_image(&self, content_id: &str) -> Result<PathBuf, BotError> {
        let stream = self.services.gateway.fetch_content(content_id).await?;

        let dir = &self.settings.image_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BotError::Analysis(format!("Failed to create {}: {e}", dir.display())))?;

        // concurrent events may land in the same millisecond
        let path = dir.join(format!("{}-{}.jpg", Utc::now().timestamp_millis(), Uuid::new_v4().simple()));
        write_stream(&path, stream).await?;
        Ok(path)
    }
}

/// Write the content into a new file; a partial file is removed on failure
async fn write_stream(path: &Path, stream: ContentStream) -> Result<(), BotError> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| write_error(path, e))?;

    match copy_chunks(path, file, stream).await {
        Ok(written) => {
            debug!(path = %path.display(), bytes = written, "Image content written");
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(path).await;
            Err(e)
        }
    }
}

async fn copy_chunks(path: &Path, mut file: tokio::fs::File, mut stream: ContentStream) -> Result<usize, BotError> {
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len();
        file.write_all(&chunk).await.map_err(|e| write_error(path, e))?;
    }
    file.flush().await.map_err(|e| write_error(path, e))?;
    Ok(written)
}

fn write_error(path: &Path, e: std::io::Error) -> BotError {
    BotError::Analysis(format!("Failed to write {}: {e}", path.display()))
}
