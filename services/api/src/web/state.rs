//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use health_chat_core::Conversation;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub conversation: Arc<Conversation>,
}

impl AppState {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        Self { conversation }
    }
}
