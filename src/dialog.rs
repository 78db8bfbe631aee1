//! Dialog engine
//!
//! A conversation is a stack of flow frames driven by a pure transition
//! function, in the same style as an Elm update loop: events in, new state
//! and effects out. The runtime executes the effects.

mod effect;
pub mod event;
pub(crate) mod flows;
pub mod state;
pub(crate) mod transition;


#[allow(unused_imports)] // Public API re-exports
pub use effect::{BotMessage, Effect};
#[allow(unused_imports)]
pub use event::{Attachment, Event};
#[allow(unused_imports)]
pub use flows::{CarRecognitionSettings, FlowOptions, FlowRegistry};
#[allow(unused_imports)]
pub use state::{DialogState, Frame, TurnStatus};
#[allow(unused_imports)]
pub use transition::{transition, TransitionError, TransitionResult};

/// Typed at any point to leave every active flow
pub const QUIT_COMMAND: &str = ":q";

/// Generic reply for failures the user can do nothing about except retry
pub const APOLOGY: &str = "Sorry, it looks like something went wrong.";

/// Case-insensitive match against [`QUIT_COMMAND`]
pub fn is_quit_command(text: &str) -> bool {
    text.eq_ignore_ascii_case(QUIT_COMMAND)
}
