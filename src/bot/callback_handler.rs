//! Callback Handler module for confirmation card postbacks

use tracing::{debug, info, warn};

use super::controller::{InteractionController, Outcome};
use super::ui_builder::format_error;
use crate::events::PostbackAction;
use crate::line::ReplyMessage;
use crate::localization::{t_args_lang, t_lang};

impl InteractionController {
    /// Resolve the user's pending action with `confirm` or `cancel`
    ///
    /// Any other data is ignored without a reply, whether or not an action
    /// is pending.
    pub async fn handle_postback(&self, user_id: &str, data: &str, reply_token: &str) -> Outcome {
        let language = self.language();

        let Some(action) = PostbackAction::parse(data) else {
            debug!(user_id = %user_id, data, "Ignoring unknown postback");
            return Outcome::UnknownAction;
        };

        let Some(pending) = self.sessions.take(user_id) else {
            info!(user_id = %user_id, action = action.as_str(), "Postback without a pending action");
            self.send(user_id, reply_token, ReplyMessage::text(t_lang("session-expired", language)))
                .await;
            return Outcome::SessionExpired;
        };

        match action {
            PostbackAction::Confirm => {
                let word_count = pending.word_list.len();
                info!(user_id = %user_id, words = word_count, "Upload confirmed");

                match self.services.uploader.upload(&pending.word_list).await {
                    Ok(receipt) => {
                        info!(
                            user_id = %user_id,
                            words = receipt.word_count,
                            dry_run = receipt.dry_run,
                            "Vocabulary uploaded"
                        );
                        let text = t_args_lang("upload-success", &[("count", &word_count.to_string())], language);
                        self.send(user_id, reply_token, ReplyMessage::text(text)).await;
                        Outcome::Uploaded { word_count }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Vocabulary upload failed");
                        self.send(user_id, reply_token, format_error(&t_lang("upload-failed", language), language))
                            .await;
                        Outcome::UploadFailed
                    }
                }
            }
            PostbackAction::Cancel => {
                info!(user_id = %user_id, words = pending.word_list.len(), "Upload cancelled");
                self.send(user_id, reply_token, ReplyMessage::text(t_lang("upload-cancelled", language)))
                    .await;
                Outcome::Cancelled
            }
        }
    }
}
