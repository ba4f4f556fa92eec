//! Interaction controller: routes inbound events and owns pending-action state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{ReplyMode, DEFAULT_LANGUAGE, DEFAULT_IMAGE_STORAGE_PATH};
use crate::events::{EventPayload, InboundEvent};
use crate::line::{ReplyGateway, ReplyMessage};
use crate::services::{ImageAnalyzer, ResultArchive, VocabularyExtractor, VocabularyUploader};
use crate::session::SessionStore;

/// Which branch an event took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A pending action was stored and the confirmation card sent
    AwaitingConfirmation { word_count: usize },
    /// Echo mode: the plain list was sent, nothing stored
    Echoed { word_count: usize },
    NoVocabulary,
    ExtractionFailed,
    Uploaded { word_count: usize },
    UploadFailed,
    Cancelled,
    /// A confirm/cancel arrived with no pending action
    SessionExpired,
    /// Postback data other than confirm/cancel; nothing was sent
    UnknownAction,
    ImageAnalyzed { question_count: usize, archived: bool },
    ImageRejected,
    ImageFailed,
}

/// External services the controller talks to
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn ReplyGateway>,
    pub extractor: Arc<dyn VocabularyExtractor>,
    pub analyzer: Arc<dyn ImageAnalyzer>,
    pub uploader: Arc<dyn VocabularyUploader>,
    pub archive: Arc<dyn ResultArchive>,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub reply_mode: ReplyMode,
    /// Language tag for every reply
    pub language: String,
    /// Where received images are written before analysis
    pub image_dir: PathBuf,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            reply_mode: ReplyMode::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            image_dir: PathBuf::from(DEFAULT_IMAGE_STORAGE_PATH),
        }
    }
}

pub struct InteractionController {
    pub(super) services: Collaborators,
    pub(super) sessions: Arc<SessionStore>,
    pub(super) settings: ControllerSettings,
}

impl InteractionController {
    pub fn new(services: Collaborators, sessions: Arc<SessionStore>, settings: ControllerSettings) -> Self {
        Self {
            services,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(super) fn language(&self) -> Option<&str> {
        Some(self.settings.language.as_str())
    }

    /// Handle one event; failures end up in the reply, never in the caller
    pub async fn handle_event(&self, event: InboundEvent) -> Outcome {
        debug!(
            user_id = %event.user_id,
            kind = event.kind(),
            "Handling inbound event"
        );

        let InboundEvent {
            user_id,
            reply_token,
            payload,
        } = event;

        let outcome = match payload {
            EventPayload::Text { text } => self.handle_text(&user_id, &text, &reply_token).await,
            EventPayload::Image { content_id } => self.handle_image(&user_id, &content_id, &reply_token).await,
            EventPayload::Postback { data } => self.handle_postback(&user_id, &data, &reply_token).await,
        };

        debug!(user_id = %user_id, outcome = ?outcome, "Event handled");
        outcome
    }

    /// Drop every pending action past its expiry; nothing is sent to the users
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let expired = self.sessions.sweep_expired(now);
        if !expired.is_empty() {
            info!(
                expired = expired.len(),
                remaining = self.sessions.len(),
                "Cleared expired pending actions"
            );
        }
        expired.len()
    }

    /// Send one reply; a delivery failure is logged and ends the event
    pub(super) async fn send(&self, user_id: &str, reply_token: &str, message: ReplyMessage) {
        let preview = message.preview().chars().take(80).collect::<String>();
        if let Err(e) = self.services.gateway.reply(reply_token, vec![message]).await {
            error!(user_id = %user_id, error = %e, "Failed to deliver reply");
        } else {
            debug!(user_id = %user_id, preview = %preview, "Reply delivered");
        }
    }
}

/// Run `sweep_expired` every `interval` until the task is aborted
pub fn spawn_session_sweeper(controller: Arc<InteractionController>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            controller.sweep_expired(Utc::now());
        }
    })
}
