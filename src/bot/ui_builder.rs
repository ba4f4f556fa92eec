//! UI Builder module for formatting vocabulary replies and confirmation cards

use serde_json::{json, Value};

use crate::events::PostbackAction;
use crate::line::ReplyMessage;
use crate::localization::{t_args_lang, t_lang};
use crate::services::Question;
use crate::session::Word;

/// Words listed on a confirmation card; the rest are summarized
pub const DISPLAY_LIMIT: usize = 10;

const ACCENT_COLOR: &str = "#1DB446";
const MUTED_COLOR: &str = "#666666";

/// A button on the confirmation card
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationAction {
    pub label: String,
    pub action: PostbackAction,
    pub display_text: String,
}

/// Everything shown when asking the user to confirm an upload
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPayload {
    pub word_count: usize,
    pub heading: String,
    /// `"{n}. {source_word} → {translation}"` for the displayed words
    pub entries: Vec<String>,
    /// Summary of the words beyond [`DISPLAY_LIMIT`]
    pub overflow: Option<String>,
    pub actions: [ConfirmationAction; 2],
    pub alt_text: String,
    title: String,
    displayed: Vec<Word>,
}

/// One enumerated list line
pub fn format_entry(index: usize, word: &Word) -> String {
    format!("{}. {} → {}", index + 1, word.source_word, word.translation)
}

/// Build the confirmation card for a non-empty word list
pub fn format_confirmation(words: &[Word], language: Option<&str>) -> ConfirmationPayload {
    let count = words.len().to_string();
    let hidden = words.len().saturating_sub(DISPLAY_LIMIT);

    ConfirmationPayload {
        word_count: words.len(),
        heading: t_args_lang("confirm-count", &[("count", &count)], language),
        entries: words
            .iter()
            .take(DISPLAY_LIMIT)
            .enumerate()
            .map(|(i, word)| format_entry(i, word))
            .collect(),
        overflow: (hidden > 0)
            .then(|| t_args_lang("confirm-more", &[("count", &hidden.to_string())], language)),
        actions: [
            ConfirmationAction {
                label: t_lang("confirm-button", language),
                action: PostbackAction::Confirm,
                display_text: t_lang("confirm-display-text", language),
            },
            ConfirmationAction {
                label: t_lang("cancel-button", language),
                action: PostbackAction::Cancel,
                display_text: t_lang("cancel-display-text", language),
            },
        ],
        alt_text: t_args_lang("confirm-alt-text", &[("count", &count)], language),
        title: t_lang("confirm-title", language),
        displayed: words.iter().take(DISPLAY_LIMIT).cloned().collect(),
    }
}

impl ConfirmationPayload {
    /// Render as a Flex bubble with postback buttons
    pub fn to_message(&self) -> ReplyMessage {
        let rows: Vec<Value> = self
            .displayed
            .iter()
            .enumerate()
            .map(|(i, word)| entry_row(i, word))
            .collect();

        let mut body = vec![
            json!({
                "type": "text",
                "text": self.title,
                "weight": "bold",
                "size": "xl",
                "color": ACCENT_COLOR,
                "align": "center"
            }),
            json!({ "type": "separator", "margin": "md" }),
            json!({
                "type": "text",
                "text": self.heading,
                "size": "md",
                "margin": "md",
                "wrap": true
            }),
            json!({
                "type": "box",
                "layout": "vertical",
                "margin": "md",
                "spacing": "sm",
                "contents": rows
            }),
        ];
        if let Some(overflow) = &self.overflow {
            body.push(json!({
                "type": "text",
                "text": overflow,
                "size": "sm",
                "color": MUTED_COLOR,
                "align": "center",
                "margin": "md"
            }));
        }

        let buttons: Vec<Value> = self
            .actions
            .iter()
            .map(|action| {
                let mut button = json!({
                    "type": "button",
                    "style": if action.action == PostbackAction::Confirm { "primary" } else { "secondary" },
                    "height": "sm",
                    "action": {
                        "type": "postback",
                        "label": action.label,
                        "data": action.action.as_str(),
                        "displayText": action.display_text
                    }
                });
                if action.action == PostbackAction::Confirm {
                    button["color"] = json!(ACCENT_COLOR);
                }
                button
            })
            .collect();

        ReplyMessage::Flex {
            alt_text: self.alt_text.clone(),
            contents: json!({
                "type": "bubble",
                "body": { "type": "box", "layout": "vertical", "contents": body },
                "footer": { "type": "box", "layout": "vertical", "spacing": "sm", "contents": buttons }
            }),
        }
    }
}

/// Number, word, arrow and translation cells of one card row
fn entry_row(index: usize, word: &Word) -> Value {
    json!({
        "type": "box",
        "layout": "horizontal",
        "contents": [
            { "type": "text", "text": format!("{}.", index + 1), "size": "sm", "color": MUTED_COLOR, "flex": 0 },
            { "type": "text", "text": word.source_word, "size": "sm", "weight": "bold", "flex": 1, "margin": "sm" },
            { "type": "text", "text": "→", "size": "sm", "color": MUTED_COLOR, "flex": 0 },
            { "type": "text", "text": word.translation, "size": "sm", "flex": 1, "margin": "sm" }
        ]
    })
}

/// Numbered plain-text list of every word
pub fn format_plain_list(words: &[Word], language: Option<&str>) -> String {
    if words.is_empty() {
        return t_lang("plain-list-empty", language);
    }

    let mut text = t_args_lang("plain-list-title", &[("count", &words.len().to_string())], language);
    text.push_str("\n\n");
    for (i, word) in words.iter().enumerate() {
        text.push_str(&format_entry(i, word));
        text.push('\n');
    }
    text
}

/// Error reply; an empty message gets the generic wording
pub fn format_error(message: &str, language: Option<&str>) -> ReplyMessage {
    let message = if message.trim().is_empty() {
        t_lang("error-fallback", language)
    } else {
        message.to_string()
    };
    ReplyMessage::text(t_args_lang("error-generic", &[("message", &message)], language))
}

/// Pretty JSON of recognized questions, as archived
pub fn format_analysis_result(questions: &[Question]) -> String {
    serde_json::to_string_pretty(&json!({ "questions": questions }))
        .unwrap_or_else(|_| format!("{} questions", questions.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_row_cells() {
        let row = entry_row(2, &Word::new("basement", "地下室"));
        assert_eq!(row["contents"][0]["text"], "3.");
        assert_eq!(row["contents"][1]["text"], "basement");
        assert_eq!(row["contents"][3]["text"], "地下室");
    }

    #[test]
    fn test_entry_row_keeps_arrows_inside_words() {
        let row = entry_row(0, &Word::new("input → output", "輸入 → 輸出"));
        assert_eq!(row["contents"][1]["text"], "input → output");
        assert_eq!(row["contents"][3]["text"], "輸入 → 輸出");
    }

    #[test]
    fn test_format_error() {
        let ReplyMessage::Text { text } = format_error("upload timed out", Some("en")) else {
            panic!("expected text");
        };
        assert_eq!(text, "❌ Error: upload timed out");

        let ReplyMessage::Text { text } = format_error("", Some("en")) else {
            panic!("expected text");
        };
        assert_eq!(text, "❌ Error: Something went wrong. Please try again.");
    }
}
