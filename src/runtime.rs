//! Runtime for driving the conversation
//!
//! One serial loop owns the [`ConversationState`], applies each event from
//! the ingress channel and executes the resulting effects.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ChatRuntime, RuntimeError};
pub use traits::*;

use crate::state_machine::{ConversationState, Theme};

/// Capacity of the ingress and outbound channels
pub const CHANNEL_CAPACITY: usize = 256;

/// Capacity of the state broadcast to renderers
pub const UPDATE_CAPACITY: usize = 64;

/// Load persisted state, falling back to an empty conversation
///
/// Storage failures are logged and never fatal.
pub async fn restore_state<S: ConversationStore + ?Sized>(store: &S) -> ConversationState {
    let messages = match store.load_messages().await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load chat history, starting empty");
            Vec::new()
        }
    };
    let theme = match store.load_theme().await {
        Ok(theme) => theme.unwrap_or_default(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load theme, using default");
            Theme::default()
        }
    };
    tracing::info!(messages = messages.len(), theme = theme.as_str(), "Restored conversation");
    ConversationState::restored(messages, theme)
}
