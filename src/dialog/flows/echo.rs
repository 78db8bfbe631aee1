//! Echo skill: repeat every message until the user quits

use super::{DialogTurn, FlowOptions, UserInput};
use crate::dialog::effect::BotMessage;
use crate::dialog::state::Frame;
use crate::dialog::QUIT_COMMAND;

fn prompt(is_in_loop: bool) -> Option<BotMessage> {
    if is_in_loop {
        return None;
    }
    BotMessage::prompt(&format!(
        "I can repeat what you say and type {QUIT_COMMAND} whenever you want to exit this skill."
    ))
}

pub fn begin(turn: &mut DialogTurn<'_>, is_in_loop: bool) {
    turn.wait(Frame::Echo { is_in_loop });
    turn.send_prompt(prompt(is_in_loop));
}

pub fn on_text(turn: &mut DialogTurn<'_>, is_in_loop: bool, input: UserInput<'_>) {
    let Some(text) = input.text else {
        // Not a text reply: ask again
        begin(turn, is_in_loop);
        return;
    };

    turn.send(BotMessage::text(text));
    turn.replace(FlowOptions::Echo { is_in_loop: true });
}
