//! Effects produced by dialog transitions

use crate::vision::ClassificationProject;

/// A message the bot sends back to the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMessage {
    pub text: String,
    /// Quick-reply buttons; empty for plain text
    pub suggested_actions: Vec<String>,
}

impl BotMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggested_actions: vec![],
        }
    }

    /// Prompt text with one button per choice
    pub fn choices<I, S>(text: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            suggested_actions: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Prompt text, or nothing at all when the text is empty.
    /// Web chat renders an empty bubble for empty messages.
    pub fn prompt(text: &str) -> Option<Self> {
        if text.is_empty() {
            None
        } else {
            Some(Self::text(text))
        }
    }
}

/// Effects to be executed after a transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Reply to the user
    Send(BotMessage),

    /// Download the attachment and classify it
    ClassifyImage {
        content_url: String,
        project: ClassificationProject,
    },

    /// A user-supplied label for an image the classifier was unsure about
    RecordTrainingSample { label: String, image: Vec<u8> },

    /// Persist the new state
    PersistState,
}

impl Effect {
    pub fn send_text(text: impl Into<String>) -> Self {
        Effect::Send(BotMessage::text(text))
    }

    /// Text of a `Send` effect
    #[allow(dead_code)] // Test and logging helper
    pub fn sent_text(&self) -> Option<&str> {
        match self {
            Effect::Send(message) => Some(&message.text),
            _ => None,
        }
    }
}
