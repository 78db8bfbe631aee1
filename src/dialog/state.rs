//! Dialog stack state

use serde::{Deserialize, Serialize};

// ============================================================================
// Menu Skills
// ============================================================================

/// Skills offered by the main menu, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Echo,
    CarRecognition,
}

impl Skill {
    pub const ALL: [Skill; 2] = [Skill::Echo, Skill::CarRecognition];

    /// Label shown on the menu button
    pub fn label(self) -> &'static str {
        match self {
            Skill::Echo => "Echo",
            Skill::CarRecognition => "Car Recognition",
        }
    }
}

// ============================================================================
// Flow Steps
// ============================================================================

/// Where the main menu is parked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MainMenuStep {
    /// Choice prompt sent, waiting for the user to pick a skill
    #[default]
    AwaitingChoice,
    /// A skill flow was pushed above the menu
    AwaitingSkill { skill: Skill },
}

/// Where the car recognition flow is parked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CarRecognitionStep {
    /// Attachment prompt sent
    AwaitingAttachment { is_in_loop: bool },

    /// Image accepted, fetch and classification in flight.
    /// Never persisted: the turn settles before state is saved.
    Classifying { is_in_loop: bool },

    /// No confident label, asked the user to name the model
    AwaitingLabel {
        #[serde(with = "base64_bytes")]
        pending_image: Vec<u8>,
    },
}

// ============================================================================
// Frames
// ============================================================================

/// One activation of a flow on the dialog stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Frame {
    MainMenu {
        is_repeater: bool,
        #[serde(default)]
        step: MainMenuStep,
    },
    Echo {
        is_in_loop: bool,
    },
    CarRecognition {
        step: CarRecognitionStep,
    },
}

impl Frame {
    /// Flow name for logs
    pub fn flow_name(&self) -> &'static str {
        match self {
            Frame::MainMenu { .. } => "main_menu",
            Frame::Echo { .. } => "echo",
            Frame::CarRecognition { .. } => "car_recognition",
        }
    }

    /// True while the frame waits on the classifier rather than the user
    pub fn is_awaiting_classification(&self) -> bool {
        matches!(
            self,
            Frame::CarRecognition {
                step: CarRecognitionStep::Classifying { .. }
            }
        )
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Persisted per-conversation state: the flow stack, innermost last
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogState {
    #[serde(default)]
    pub stack: Vec<Frame>,
}

impl DialogState {
    pub fn new(stack: Vec<Frame>) -> Self {
        Self { stack }
    }

    /// The flow that receives the next user message
    pub fn active(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Status of the dialog after a continuation, or `None` while the
    /// active frame is still waiting on the classifier.
    pub fn turn_status(&self) -> Option<TurnStatus> {
        stack_status(&self.stack)
    }
}

pub(crate) fn stack_status(stack: &[Frame]) -> Option<TurnStatus> {
    match stack.last() {
        None => Some(TurnStatus::Complete),
        Some(frame) if frame.is_awaiting_classification() => None,
        Some(_) => Some(TurnStatus::Waiting),
    }
}

/// Outcome of continuing the active flow with a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// A flow issued a prompt and waits for the next message
    Waiting,
    /// The stack unwound completely
    Complete,
    /// The active flow was abandoned without finishing
    Cancelled,
    /// There was no flow to continue
    Empty,
}

/// Image bytes are stored as base64 inside the JSON state
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
