//! Channel activity wire types

use crate::dialog::{Attachment, BotMessage, Event};
use serde::{Deserialize, Serialize};

/// Activity types the router handles
pub const MESSAGE: &str = "message";
pub const CONVERSATION_UPDATE: &str = "conversationUpdate";

/// A user or bot on the channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// File reference on an inbound message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAttachment {
    #[serde(default)]
    pub content_type: String,
    pub content_url: Option<String>,
    pub name: Option<String>,
}

/// Inbound activity posted by the channel
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub id: Option<String>,
    pub channel_id: Option<String>,
    pub service_url: Option<String>,
    pub from: Option<ChannelAccount>,
    pub recipient: Option<ChannelAccount>,
    pub conversation: Option<ConversationAccount>,
    pub text: Option<String>,
    pub attachments: Option<Vec<ActivityAttachment>>,
    pub members_added: Option<Vec<ChannelAccount>>,
}

impl Activity {
    /// Conversation id, if the channel sent a usable one
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Translate to a dialog event. `None` means the activity needs no turn.
    pub fn to_event(&self) -> Option<Event> {
        match self.activity_type.as_str() {
            MESSAGE => Some(Event::UserMessage {
                text: self.text.clone(),
                attachments: self
                    .attachments
                    .iter()
                    .flatten()
                    .map(|a| Attachment {
                        content_type: a.content_type.clone(),
                        content_url: a.content_url.clone().unwrap_or_default(),
                        name: a.name.clone(),
                    })
                    .collect(),
            }),
            CONVERSATION_UPDATE => self.someone_else_joined().then_some(Event::MembersAdded),
            other => Some(Event::Unrecognized {
                activity_type: other.to_string(),
            }),
        }
    }

    /// True when a member other than the bot was added
    fn someone_else_joined(&self) -> bool {
        let bot_id = self.recipient.as_ref().map(|r| r.id.as_str());
        self.members_added
            .iter()
            .flatten()
            .any(|member| Some(member.id.as_str()) != bot_id)
    }
}

/// Quick-reply button
#[derive(Debug, Clone, Serialize)]
pub struct CardAction {
    #[serde(rename = "type")]
    pub action_type: &'static str,
    pub title: String,
    pub value: String,
}

impl CardAction {
    /// Button that posts its value back as if the user typed it
    pub fn im_back(choice: String) -> Self {
        Self {
            action_type: "imBack",
            title: choice.clone(),
            value: choice,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedActions {
    pub actions: Vec<CardAction>,
}

/// Reply activity returned to the channel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingActivity {
    #[serde(rename = "type")]
    pub activity_type: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<SuggestedActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
}

impl OutgoingActivity {
    /// Address a bot message back to the sender of `inbound`
    pub fn reply_to(inbound: &Activity, message: BotMessage) -> Self {
        let suggested_actions = (!message.suggested_actions.is_empty()).then(|| SuggestedActions {
            actions: message
                .suggested_actions
                .into_iter()
                .map(CardAction::im_back)
                .collect(),
        });

        Self {
            activity_type: MESSAGE,
            text: message.text,
            suggested_actions,
            reply_to_id: inbound.id.clone(),
            channel_id: inbound.channel_id.clone(),
            service_url: inbound.service_url.clone(),
            from: inbound.recipient.clone(),
            recipient: inbound.from.clone(),
            conversation: inbound.conversation.clone(),
        }
    }
}

/// Response body for a processed activity
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub activities: Vec<OutgoingActivity>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
