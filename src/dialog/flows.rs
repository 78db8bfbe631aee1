//! Flow registry and the per-turn dialog stack operations
//!
//! Each flow is a short script of prompt/response steps. Step handlers take
//! the active frame off the stack by value and either push it back (still
//! waiting), push a new frame (begin or restart in place) or leave it off
//! (end, which resumes the parent).

pub(crate) mod car_recognition;
pub(crate) mod echo;
pub(crate) mod main_menu;

use super::effect::{BotMessage, Effect};
use super::event::Attachment;
use super::state::{stack_status, CarRecognitionStep, DialogState, Frame, MainMenuStep, TurnStatus};
use super::transition::TransitionResult;
use crate::vision::ClassificationProject;
use uuid::Uuid;

/// Threshold used when no configuration is available
pub const DEFAULT_PROBABILITY_THRESHOLD: f64 = 0.8;

// ============================================================================
// Registry
// ============================================================================

/// Settings for the car recognition flow
#[derive(Debug, Clone, PartialEq)]
pub struct CarRecognitionSettings {
    pub project: ClassificationProject,
    /// Minimum confidence for a label to be accepted without asking
    pub probability_threshold: f64,
}

impl CarRecognitionSettings {
    pub fn new(project: ClassificationProject, probability_threshold: f64) -> Self {
        Self {
            project,
            probability_threshold,
        }
    }

    /// Placeholder used when the classifier is not configured; every
    /// classification fails before these values matter.
    pub fn unconfigured() -> Self {
        Self::new(
            ClassificationProject::new(Uuid::nil(), ""),
            DEFAULT_PROBABILITY_THRESHOLD,
        )
    }
}

/// Immutable flow wiring, built once at startup and shared by every turn
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    car_recognition: CarRecognitionSettings,
}

impl FlowRegistry {
    pub fn new(car_recognition: CarRecognitionSettings) -> Self {
        Self { car_recognition }
    }

    pub fn car_recognition(&self) -> &CarRecognitionSettings {
        &self.car_recognition
    }
}

/// Options a flow is started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOptions {
    MainMenu { is_repeater: bool },
    Echo { is_in_loop: bool },
    CarRecognition { is_in_loop: bool },
}

// ============================================================================
// Turn
// ============================================================================

/// The user message a waiting frame is resumed with
#[derive(Debug, Clone, Copy)]
pub struct UserInput<'a> {
    pub text: Option<&'a str>,
    pub attachments: &'a [Attachment],
}

/// Working copy of the stack for one transition, plus the effects emitted
pub(crate) struct DialogTurn<'a> {
    registry: &'a FlowRegistry,
    stack: Vec<Frame>,
    effects: Vec<Effect>,
}

impl<'a> DialogTurn<'a> {
    pub fn new(registry: &'a FlowRegistry, state: &DialogState) -> Self {
        Self {
            registry,
            stack: state.stack.clone(),
            effects: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'a FlowRegistry {
        self.registry
    }

    pub fn send(&mut self, message: BotMessage) {
        self.effects.push(Effect::Send(message));
    }

    pub fn send_text(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::send_text(text));
    }

    /// Send a prompt if there is one
    pub fn send_prompt(&mut self, prompt: Option<BotMessage>) {
        if let Some(message) = prompt {
            self.send(message);
        }
    }

    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Park a frame on top of the stack
    pub fn wait(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    /// Push a new flow above the current one and run its first step
    pub fn begin(&mut self, options: FlowOptions) {
        tracing::debug!(?options, depth = self.stack.len(), "Beginning flow");
        match options {
            FlowOptions::MainMenu { is_repeater } => main_menu::begin(self, is_repeater),
            FlowOptions::Echo { is_in_loop } => echo::begin(self, is_in_loop),
            FlowOptions::CarRecognition { is_in_loop } => car_recognition::begin(self, is_in_loop),
        }
    }

    /// Start a flow in place of the frame the caller already took off
    pub fn replace(&mut self, options: FlowOptions) {
        self.begin(options);
    }

    /// The frame the caller took off has finished: resume its parent
    pub fn end(&mut self) {
        let Some(parent) = self.stack.pop() else {
            return;
        };
        match parent {
            Frame::MainMenu { .. } => main_menu::on_skill_complete(self),
            other => {
                // Skill flows never start children
                tracing::warn!(flow = other.flow_name(), "Child ended under a flow with no children");
                self.stack.push(other);
            }
        }
    }

    /// Resume the active flow with a user message.
    ///
    /// Returns the dialog status, or `None` while a classification is pending.
    pub fn continue_with(&mut self, input: UserInput<'_>) -> Option<TurnStatus> {
        let Some(frame) = self.stack.pop() else {
            return Some(TurnStatus::Empty);
        };

        match frame {
            Frame::MainMenu {
                is_repeater,
                step: MainMenuStep::AwaitingChoice,
            } => main_menu::on_choice(self, is_repeater, input),
            Frame::MainMenu {
                step: MainMenuStep::AwaitingSkill { .. },
                ..
            } => main_menu::on_skill_complete(self),
            Frame::Echo { is_in_loop } => echo::on_text(self, is_in_loop, input),
            Frame::CarRecognition {
                step: CarRecognitionStep::Classifying { .. },
            } => {
                tracing::warn!("Abandoning car recognition left mid-classification");
                return Some(TurnStatus::Cancelled);
            }
            Frame::CarRecognition { step } => car_recognition::on_input(self, step, input),
        }

        self.status()
    }

    /// Take the frame waiting on the classifier off the stack
    pub fn take_classifying(&mut self) -> Option<bool> {
        match self.stack.last() {
            Some(Frame::CarRecognition {
                step: CarRecognitionStep::Classifying { is_in_loop },
            }) => {
                let is_in_loop = *is_in_loop;
                self.stack.pop();
                Some(is_in_loop)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<TurnStatus> {
        stack_status(&self.stack)
    }

    /// Finish the transition. State is persisted unless a classification is
    /// still in flight; that turn saves once the result arrives.
    pub fn finish(self) -> TransitionResult {
        let state = DialogState::new(self.stack);
        let awaiting = state
            .active()
            .is_some_and(Frame::is_awaiting_classification);

        let result = TransitionResult::new(state).with_effects(self.effects);
        if awaiting {
            result
        } else {
            result.with_effect(Effect::PersistState)
        }
    }
}
