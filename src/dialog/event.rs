//! Events that can occur in a conversation

use crate::vision::Prediction;

/// Events that trigger dialog transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Channel events
    /// Someone other than the bot joined the conversation
    MembersAdded,
    UserMessage {
        text: Option<String>,
        attachments: Vec<Attachment>,
    },
    /// Any activity type the router has no handler for
    Unrecognized { activity_type: String },

    // Classifier events
    ClassificationComplete {
        predictions: Vec<Prediction>,
        image: Vec<u8>,
    },
    ClassificationFailed { message: String },
}

/// Inbound file reference carried by a user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub content_url: String,
    pub name: Option<String>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, content_url: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content_url: content_url.into(),
            name: None,
        }
    }
}

#[cfg(test)]
impl Event {
    /// Plain text message with no attachments
    pub fn text(text: impl Into<String>) -> Self {
        Event::UserMessage {
            text: Some(text.into()),
            attachments: vec![],
        }
    }

    /// Message carrying only attachments
    pub fn attachments(attachments: Vec<Attachment>) -> Self {
        Event::UserMessage {
            text: None,
            attachments,
        }
    }
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::MembersAdded => "members_added",
            Event::UserMessage { .. } => "user_message",
            Event::Unrecognized { .. } => "unrecognized",
            Event::ClassificationComplete { .. } => "classification_complete",
            Event::ClassificationFailed { .. } => "classification_failed",
        }
    }
}
