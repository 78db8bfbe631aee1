//! HTTP API for the bot
//!
//! The channel posts one activity per request and receives the bot's
//! replies for that turn in the response body.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::RuntimeManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
}

impl AppState {
    pub fn new(runtime: RuntimeManager) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
