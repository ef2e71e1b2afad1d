//! Conversation runtime executor

use super::traits::ConversationStore;
use crate::protocol::OutboundFrame;
use crate::state_machine::{transition, ConversationState, Effect, Event};
use crate::storage::StorageError;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Connection task is gone, question dropped")]
    OutboundClosed,
}

/// Serial event loop over the conversation reducer
pub struct ChatRuntime<S>
where
    S: ConversationStore + 'static,
{
    state: ConversationState,
    storage: S,
    event_rx: mpsc::Receiver<Event>,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    update_tx: broadcast::Sender<ConversationState>,
    /// Messages changed since the last successful save
    unsaved: bool,
}

impl<S> ChatRuntime<S>
where
    S: ConversationStore + 'static,
{
    pub fn new(
        state: ConversationState,
        storage: S,
        event_rx: mpsc::Receiver<Event>,
        outbound_tx: mpsc::Sender<OutboundFrame>,
        update_tx: broadcast::Sender<ConversationState>,
    ) -> Self {
        Self {
            state,
            storage,
            event_rx,
            outbound_tx,
            update_tx,
            unsaved: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Process events until every sender is dropped; returns the final state
    pub async fn run(mut self) -> ConversationState {
        tracing::info!("Starting conversation runtime");

        // Renderers see the restored state before the first event
        let _ = self.update_tx.send(self.state.clone());

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event).await;
        }

        self.flush().await;
        tracing::info!("Conversation runtime stopped");
        self.state
    }

    /// Save messages that no effect has written yet (a stream in progress)
    async fn flush(&mut self) {
        if !self.unsaved {
            return;
        }
        match self.storage.save_messages(&self.state.messages).await {
            Ok(()) => self.unsaved = false,
            Err(e) => tracing::error!(error = %e, "Failed to save history on shutdown"),
        }
    }

    /// Apply one event to completion, effects included
    pub async fn process_event(&mut self, event: Event) {
        tracing::debug!(event = event.kind(), "Processing event");

        if let Event::Submit { text } = &event {
            if let Err(reason) = self.state.check_submit(text) {
                tracing::debug!(%reason, "Submit ignored");
            }
        }

        let result = transition(&self.state, event);
        let changed = result.new_state != self.state;
        if result.new_state.messages != self.state.messages {
            self.unsaved = true;
        }
        self.state = result.new_state;

        for effect in result.effects {
            if let Err(e) = self.execute_effect(effect).await {
                tracing::error!(error = %e, "Effect failed");
            }
        }

        if changed {
            // No receivers is fine: nothing is rendering right now
            let _ = self.update_tx.send(self.state.clone());
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<(), RuntimeError> {
        match effect {
            Effect::SendQuestion { question } => {
                tracing::info!(chars = question.len(), "Sending question");
                self.outbound_tx
                    .send(OutboundFrame::question(question))
                    .await
                    .map_err(|_| RuntimeError::OutboundClosed)
            }

            Effect::PersistMessages => {
                self.storage.save_messages(&self.state.messages).await?;
                self.unsaved = false;
                Ok(())
            }

            Effect::PersistTheme => {
                self.storage.save_theme(self.state.theme).await?;
                Ok(())
            }
        }
    }
}
