//! Root menu: pick a skill, run it, end

use super::{DialogTurn, FlowOptions, UserInput};
use crate::dialog::effect::BotMessage;
use crate::dialog::state::{Frame, MainMenuStep, Skill};
use crate::dialog::QUIT_COMMAND;

const WELCOME: &str = "Welcome to WithBugs' Bot!";
const WELCOME_AGAIN: &str = "Hi again.";

/// Menu prompt, shorter greeting on repeat entries
pub fn prompt(is_repeater: bool) -> BotMessage {
    let greeting = if is_repeater { WELCOME_AGAIN } else { WELCOME };
    let text = format!(
        "{greeting} Please select a skill from the choices below or type {QUIT_COMMAND} whenever you want to end dialog."
    );
    BotMessage::choices(text, Skill::ALL.iter().map(|skill| skill.label()))
}

/// Step 1: show the menu
pub fn begin(turn: &mut DialogTurn<'_>, is_repeater: bool) {
    turn.wait(Frame::MainMenu {
        is_repeater,
        step: MainMenuStep::AwaitingChoice,
    });
    turn.send(prompt(is_repeater));
}

/// Step 2: dispatch to the chosen skill. Anything unrecognized falls
/// through to the final step.
pub fn on_choice(turn: &mut DialogTurn<'_>, is_repeater: bool, input: UserInput<'_>) {
    match recognize_choice(input.text) {
        Some(skill) => {
            turn.wait(Frame::MainMenu {
                is_repeater,
                step: MainMenuStep::AwaitingSkill { skill },
            });
            let options = match skill {
                Skill::Echo => FlowOptions::Echo { is_in_loop: false },
                Skill::CarRecognition => FlowOptions::CarRecognition { is_in_loop: false },
            };
            turn.begin(options);
        }
        None => {
            tracing::debug!(text = ?input.text, "Menu choice not recognized");
            on_skill_complete(turn);
        }
    }
}

/// Step 3: the menu always ends here
pub fn on_skill_complete(turn: &mut DialogTurn<'_>) {
    turn.end();
}

/// Match a reply against the menu labels, ignoring case, or by 1-based
/// position in the menu.
pub fn recognize_choice(text: Option<&str>) -> Option<Skill> {
    let text = text?.trim();

    if let Some(skill) = Skill::ALL
        .iter()
        .find(|skill| skill.label().eq_ignore_ascii_case(text))
    {
        return Some(*skill);
    }

    text.parse::<usize>()
        .ok()
        .and_then(|ordinal| ordinal.checked_sub(1))
        .and_then(|index| Skill::ALL.get(index).copied())
}
