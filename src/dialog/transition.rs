//! Pure state transition function
//!
//! Routes one event to the dialog stack. Given the same inputs it always
//! produces the same outputs and performs no I/O.

use super::effect::Effect;
use super::event::Event;
use super::flows::{car_recognition, DialogTurn, FlowOptions, FlowRegistry, UserInput};
use super::state::{DialogState, TurnStatus};
use super::is_quit_command;
use thiserror::Error;

const GOODBYE: &str = "See ya!";
const SAY_ANYTHING: &str = "Say anything to continue.";
const NOT_IMPLEMENTED: &str = "Not yet implemented.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No classification is pending for event {0}")]
    NoPendingClassification(&'static str),
}

/// Pure transition function
pub fn transition(
    state: &DialogState,
    registry: &FlowRegistry,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Channel events
        // ============================================================
        Event::MembersAdded => {
            let mut turn = DialogTurn::new(registry, state);
            turn.begin(FlowOptions::MainMenu { is_repeater: false });
            Ok(turn.finish())
        }

        Event::UserMessage { text, attachments } => {
            if text.as_deref().is_some_and(is_quit_command) {
                tracing::debug!(depth = state.stack.len(), "Quit requested, clearing stack");
                return Ok(TransitionResult::new(DialogState::default())
                    .with_effect(Effect::send_text(GOODBYE))
                    .with_effect(Effect::send_text(SAY_ANYTHING))
                    .with_effect(Effect::PersistState));
            }

            let mut turn = DialogTurn::new(registry, state);

            if !state.is_active() {
                turn.begin(FlowOptions::MainMenu { is_repeater: true });
                return Ok(turn.finish());
            }

            let status = turn.continue_with(UserInput {
                text: text.as_deref(),
                attachments: &attachments,
            });
            match status {
                Some(TurnStatus::Cancelled | TurnStatus::Empty) => turn.send_text(NOT_IMPLEMENTED),
                Some(TurnStatus::Complete) => turn.send_text(SAY_ANYTHING),
                Some(TurnStatus::Waiting) | None => {}
            }
            Ok(turn.finish())
        }

        Event::Unrecognized { activity_type } => Ok(TransitionResult::new(state.clone())
            .with_effect(Effect::send_text(format!("{activity_type} activity detected")))
            .with_effect(Effect::PersistState)),

        // ============================================================
        // Classifier events
        // ============================================================
        Event::ClassificationComplete { predictions, image } => {
            let mut turn = DialogTurn::new(registry, state);
            if turn.take_classifying().is_none() {
                return Err(TransitionError::NoPendingClassification(
                    "classification_complete",
                ));
            }
            car_recognition::on_classified(&mut turn, &predictions, image);
            Ok(turn.finish())
        }

        Event::ClassificationFailed { message } => {
            let mut turn = DialogTurn::new(registry, state);
            let Some(is_in_loop) = turn.take_classifying() else {
                return Err(TransitionError::NoPendingClassification(
                    "classification_failed",
                ));
            };
            car_recognition::on_classification_failed(&mut turn, is_in_loop, &message);
            Ok(turn.finish())
        }
    }
}
