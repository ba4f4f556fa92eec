//! Platform-independent inbound events.

/// A validated event ready for the interaction controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: String,
    pub reply_token: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Text { text: String },
    /// `content_id` fetches the full image through the reply gateway
    Image { content_id: String },
    Postback { data: String },
}

impl InboundEvent {
    pub fn text(user_id: impl Into<String>, reply_token: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            reply_token: reply_token.into(),
            payload: EventPayload::Text { text: text.into() },
        }
    }

    pub fn image(
        user_id: impl Into<String>,
        reply_token: impl Into<String>,
        content_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            reply_token: reply_token.into(),
            payload: EventPayload::Image {
                content_id: content_id.into(),
            },
        }
    }

    pub fn postback(user_id: impl Into<String>, reply_token: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            reply_token: reply_token.into(),
            payload: EventPayload::Postback { data: data.into() },
        }
    }

    /// Short name for log fields
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Text { .. } => "text",
            EventPayload::Image { .. } => "image",
            EventPayload::Postback { .. } => "postback",
        }
    }
}

/// Actions a confirmation card can post back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostbackAction {
    Confirm,
    Cancel,
}

impl PostbackAction {
    /// `None` for anything but the literal `confirm` / `cancel` tokens
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "confirm" => Some(PostbackAction::Confirm),
            "cancel" => Some(PostbackAction::Cancel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostbackAction::Confirm => "confirm",
            PostbackAction::Cancel => "cancel",
        }
    }
}
