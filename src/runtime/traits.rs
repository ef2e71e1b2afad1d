//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::state_machine::{Message, Theme};
use crate::storage::StorageError;
use async_trait::async_trait;
use std::sync::Arc;

/// Client-local persistence for the conversation
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stored message history, empty when nothing was saved yet
    async fn load_messages(&self) -> Result<Vec<Message>, StorageError>;

    /// Replace the stored message history
    async fn save_messages(&self, messages: &[Message]) -> Result<(), StorageError>;

    /// Stored theme, `None` when nothing (or nothing valid) was saved
    async fn load_theme(&self) -> Result<Option<Theme>, StorageError>;

    async fn save_theme(&self, theme: Theme) -> Result<(), StorageError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn load_messages(&self) -> Result<Vec<Message>, StorageError> {
        (**self).load_messages().await
    }

    async fn save_messages(&self, messages: &[Message]) -> Result<(), StorageError> {
        (**self).save_messages(messages).await
    }

    async fn load_theme(&self) -> Result<Option<Theme>, StorageError> {
        (**self).load_theme().await
    }

    async fn save_theme(&self, theme: Theme) -> Result<(), StorageError> {
        (**self).save_theme(theme).await
    }
}
