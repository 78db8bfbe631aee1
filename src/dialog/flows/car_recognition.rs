//! Car recognition skill
//!
//! Asks for a single JPEG, classifies it and either names the model or asks
//! the user for the label. The classify step runs outside the state machine:
//! the frame parks in `Classifying` until a `ClassificationComplete` or
//! `ClassificationFailed` event resumes it.

use super::{DialogTurn, FlowOptions, UserInput};
use crate::dialog::effect::{BotMessage, Effect};
use crate::dialog::event::Attachment;
use crate::dialog::state::{CarRecognitionStep, Frame};
use crate::dialog::{APOLOGY, QUIT_COMMAND};
use crate::vision::Prediction;

/// The only content type the flow accepts
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

const ASK_FOR_LABEL: &str = "I'm not sure what it is. Could you tell me the car model?";

fn prompt(is_in_loop: bool) -> Option<BotMessage> {
    if is_in_loop {
        return None;
    }
    BotMessage::prompt(&format!(
        "I can recognize car model. Could you upload a photo of a car? Type {QUIT_COMMAND} whenever you want to exit this skill."
    ))
}

fn retry_prompt() -> String {
    format!("Let's retry or type {QUIT_COMMAND} to exit.")
}

// ============================================================================
// Validation
// ============================================================================

/// Why an upload was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRejection {
    /// Nothing attached
    Missing,
    /// Several files, or a single file that is not a JPEG
    NotSingleJpeg,
}

impl AttachmentRejection {
    /// Messages sent back to the user, in order
    pub fn replies(self) -> Vec<String> {
        match self {
            AttachmentRejection::Missing => vec![
                "I'm sorry, I do not understand that. Please upload a jpeg image of a car.".to_string(),
            ],
            AttachmentRejection::NotSingleJpeg => {
                vec!["Sorry, we can only take one jpeg file.".to_string(), retry_prompt()]
            }
        }
    }
}

/// Accept exactly one attachment whose content type is exactly `image/jpeg`
pub fn validate_attachments(attachments: &[Attachment]) -> Result<&Attachment, AttachmentRejection> {
    match attachments {
        [] => Err(AttachmentRejection::Missing),
        [single] if single.content_type == JPEG_CONTENT_TYPE => Ok(single),
        _ => Err(AttachmentRejection::NotSingleJpeg),
    }
}

/// First prediction, in classifier order, at or above the threshold.
/// An empty label counts as no match.
pub fn confident_label(predictions: &[Prediction], threshold: f64) -> Option<&str> {
    predictions
        .iter()
        .find(|p| p.probability >= threshold)
        .map(|p| p.label.as_str())
        .filter(|label| !label.is_empty())
}

// ============================================================================
// Steps
// ============================================================================

pub fn begin(turn: &mut DialogTurn<'_>, is_in_loop: bool) {
    turn.wait(Frame::CarRecognition {
        step: CarRecognitionStep::AwaitingAttachment { is_in_loop },
    });
    turn.send_prompt(prompt(is_in_loop));
}

pub fn on_input(turn: &mut DialogTurn<'_>, step: CarRecognitionStep, input: UserInput<'_>) {
    match step {
        CarRecognitionStep::AwaitingAttachment { is_in_loop } => {
            on_attachment(turn, is_in_loop, input.attachments);
        }
        CarRecognitionStep::AwaitingLabel { pending_image } => {
            on_label(turn, pending_image, input.text);
        }
        step @ CarRecognitionStep::Classifying { .. } => {
            tracing::warn!("User message reached a frame waiting on the classifier");
            turn.wait(Frame::CarRecognition { step });
        }
    }
}

fn on_attachment(turn: &mut DialogTurn<'_>, is_in_loop: bool, attachments: &[Attachment]) {
    match validate_attachments(attachments) {
        Ok(attachment) => {
            tracing::debug!(
                url = %attachment.content_url,
                name = attachment.name.as_deref().unwrap_or_default(),
                "Attachment accepted for classification"
            );
            let project = turn.registry().car_recognition().project.clone();
            turn.wait(Frame::CarRecognition {
                step: CarRecognitionStep::Classifying { is_in_loop },
            });
            turn.emit(Effect::ClassifyImage {
                content_url: attachment.content_url.clone(),
                project,
            });
        }
        Err(rejection) => {
            tracing::debug!(?rejection, count = attachments.len(), "Attachment rejected");
            turn.wait(Frame::CarRecognition {
                step: CarRecognitionStep::AwaitingAttachment { is_in_loop },
            });
            for reply in rejection.replies() {
                turn.send_text(reply);
            }
        }
    }
}

fn on_label(turn: &mut DialogTurn<'_>, pending_image: Vec<u8>, text: Option<&str>) {
    let Some(label) = text else {
        turn.wait(Frame::CarRecognition {
            step: CarRecognitionStep::AwaitingLabel { pending_image },
        });
        turn.send_text(ASK_FOR_LABEL);
        return;
    };

    turn.send_text(format!(
        "Thank you! I'll keep learning to be able to distingish {label}."
    ));
    turn.emit(Effect::RecordTrainingSample {
        label: label.to_string(),
        image: pending_image,
    });
    turn.replace(FlowOptions::CarRecognition { is_in_loop: false });
}

/// Resume after the classifier answered. The `Classifying` frame has
/// already been taken off the stack.
pub fn on_classified(turn: &mut DialogTurn<'_>, predictions: &[Prediction], image: Vec<u8>) {
    let threshold = turn.registry().car_recognition().probability_threshold;

    if let Some(label) = confident_label(predictions, threshold) {
        tracing::info!(label, "Car recognized");
        turn.send_text(format!("Wow! Nice {label}!"));
        turn.replace(FlowOptions::CarRecognition { is_in_loop: true });
        return;
    }

    tracing::info!(
        predictions = predictions.len(),
        threshold,
        "No confident prediction, asking for a label"
    );
    turn.wait(Frame::CarRecognition {
        step: CarRecognitionStep::AwaitingLabel {
            pending_image: image,
        },
    });
    turn.send_text(ASK_FOR_LABEL);
}

/// Resume after fetch or classification failed: back to the attachment
/// prompt without re-sending it.
pub fn on_classification_failed(turn: &mut DialogTurn<'_>, is_in_loop: bool, message: &str) {
    tracing::warn!(error = %message, "Classification failed");
    turn.wait(Frame::CarRecognition {
        step: CarRecognitionStep::AwaitingAttachment { is_in_loop },
    });
    turn.send_text(APOLOGY);
}
