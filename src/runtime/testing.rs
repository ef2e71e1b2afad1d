//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{ChatRuntime, CHANNEL_CAPACITY, UPDATE_CAPACITY};
use crate::protocol::OutboundFrame;
use crate::state_machine::{ConversationState, Event, Message, Theme};
use crate::storage::StorageError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// In-memory store
// ============================================================================

/// Store that keeps everything in memory and counts writes
#[derive(Default)]
pub struct InMemoryStore {
    messages: Mutex<Vec<Message>>,
    theme: Mutex<Option<Theme>>,
    pub message_saves: AtomicUsize,
    pub theme_saves: AtomicUsize,
    /// Make every save fail
    pub fail_saves: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(messages: Vec<Message>, theme: Option<Theme>) -> Self {
        Self {
            messages: Mutex::new(messages),
            theme: Mutex::new(theme),
            ..Self::default()
        }
    }

    pub fn stored_messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn stored_theme(&self) -> Option<Theme> {
        *self.theme.lock().unwrap()
    }

    fn check_fail(&self) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: "memory".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load_messages(&self) -> Result<Vec<Message>, StorageError> {
        Ok(self.stored_messages())
    }

    async fn save_messages(&self, messages: &[Message]) -> Result<(), StorageError> {
        self.check_fail()?;
        self.message_saves.fetch_add(1, Ordering::SeqCst);
        *self.messages.lock().unwrap() = messages.to_vec();
        Ok(())
    }

    async fn load_theme(&self) -> Result<Option<Theme>, StorageError> {
        Ok(self.stored_theme())
    }

    async fn save_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.check_fail()?;
        self.theme_saves.fetch_add(1, Ordering::SeqCst);
        *self.theme.lock().unwrap() = Some(theme);
        Ok(())
    }
}

// ============================================================================
// Test runtime
// ============================================================================

/// Runtime wired to in-memory channels and an [`InMemoryStore`]
pub struct TestRuntime {
    pub runtime: ChatRuntime<Arc<InMemoryStore>>,
    pub store: Arc<InMemoryStore>,
    pub event_tx: mpsc::Sender<Event>,
    pub outbound_rx: mpsc::Receiver<OutboundFrame>,
    pub update_rx: broadcast::Receiver<ConversationState>,
}

impl TestRuntime {
    pub fn new(state: ConversationState) -> Self {
        Self::with_store(state, Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(state: ConversationState, store: Arc<InMemoryStore>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (update_tx, update_rx) = broadcast::channel(UPDATE_CAPACITY);
        let runtime = ChatRuntime::new(state, store.clone(), event_rx, outbound_tx, update_tx);
        Self {
            runtime,
            store,
            event_tx,
            outbound_rx,
            update_rx,
        }
    }

    /// Apply events directly, bypassing the channel
    pub async fn apply(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.runtime.process_event(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_frame, WebResultEntry};
    use crate::runtime::restore_state;
    use crate::state_machine::transition::CONNECTION_LOST;
    use crate::state_machine::{ConnectionStatus, MessageKind};

    fn connected_event() -> Event {
        Event::ConnectionChanged {
            status: ConnectionStatus::Connected,
        }
    }

    fn connection(status: ConnectionStatus) -> Event {
        Event::ConnectionChanged { status }
    }

    fn token(text: &str) -> Event {
        Event::TokenAppended {
            text: text.to_string(),
        }
    }

    fn submit(text: &str) -> Event {
        Event::Submit {
            text: text.to_string(),
        }
    }

    fn frame(text: &str) -> Event {
        decode_frame(text).unwrap().to_event().unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        store.save_messages(&[Message::user("hi")]).await.unwrap();
        store.save_theme(Theme::Light).await.unwrap();

        assert_eq!(store.load_messages().await.unwrap(), vec![Message::user("hi")]);
        assert_eq!(store.load_theme().await.unwrap(), Some(Theme::Light));
        assert_eq!(store.message_saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_sends_frame_and_persists() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([connected_event(), submit("What is CRAG?")]).await;

        let sent = rt.outbound_rx.try_recv().unwrap();
        assert_eq!(sent, OutboundFrame::question("What is CRAG?"));
        assert_eq!(rt.store.stored_messages(), vec![Message::user("What is CRAG?")]);
        assert!(rt.runtime.state().is_processing);
    }

    #[tokio::test]
    async fn test_submit_while_disconnected_sends_nothing() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([submit("What is CRAG?")]).await;

        assert!(rt.outbound_rx.try_recv().is_err());
        assert!(rt.runtime.state().messages.is_empty());
        assert!(!rt.runtime.state().is_processing);
        assert_eq!(rt.store.message_saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_backend_session() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([connected_event(), submit("What is CRAG?")]).await;
        rt.apply([
            frame(r#"{"type":"step_start","node":"retrieve"}"#),
            frame(r#"{"type":"status","data":"Grading documents..."}"#),
            frame(r#"{"type":"step_end","node":"retrieve"}"#),
            frame(r#"{"type":"tool_start","node":"tavily"}"#),
            frame(r#"{"type":"status","data":"Searching the web..."}"#),
            frame(r#"{"type":"web_search_results","data":[{"title":"A","url":"u1"}]}"#),
            frame(r#"{"type":"llm_start"}"#),
            frame(r#"{"type":"stream","data":"CRAG "}"#),
            frame(r#"{"type":"stream","data":"grades retrieval."}"#),
        ])
        .await;

        let state = rt.runtime.state();
        assert_eq!(state.active_step.as_deref(), Some("llm"));
        assert_eq!(state.steps.len(), 3);
        assert!(state.streaming_message().is_some());

        rt.apply([frame(r#"{"type":"end"}"#)]).await;

        let state = rt.runtime.state();
        assert!(!state.is_processing);
        assert!(state.steps.is_empty());
        let kinds: Vec<_> = state.messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::User, MessageKind::WebResults, MessageKind::Assistant]
        );
        assert_eq!(state.messages[2].as_text(), Some("CRAG grades retrieval."));
        assert_eq!(rt.store.stored_messages(), state.messages);
        assert!(!rt.store.stored_messages()[2].streaming);
    }

    #[tokio::test]
    async fn test_web_results_entries_survive_persistence() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([Event::WebResultsPosted {
            entries: vec![WebResultEntry::new("A", "u1").with_snippet("s")],
        }])
        .await;

        let restored = restore_state(rt.store.as_ref()).await;
        assert_eq!(restored.messages, rt.runtime.state().messages);
    }

    #[tokio::test]
    async fn test_theme_toggle_persists() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([Event::ToggleTheme]).await;

        assert_eq!(rt.store.stored_theme(), Some(Theme::Light));
        assert_eq!(rt.store.theme_saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_saves.store(true, Ordering::SeqCst);
        let mut rt = TestRuntime::with_store(ConversationState::default(), store);

        rt.apply([connected_event(), submit("still works")]).await;

        assert!(rt.runtime.state().is_processing);
        assert_eq!(rt.runtime.state().messages.len(), 1);
        assert!(rt.outbound_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_updates_broadcast_on_change_only() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([connected_event()]).await;
        let update = rt.update_rx.try_recv().unwrap();
        assert!(update.is_connected());

        // Unmatched step end changes nothing
        rt.apply([Event::StepEnded {
            name: "retrieve".to_string(),
        }])
        .await;
        assert!(rt.update_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_drains_channel_and_returns_final_state() {
        let rt = TestRuntime::new(ConversationState::default());
        let TestRuntime {
            runtime, event_tx, ..
        } = rt;
        let handle = tokio::spawn(runtime.run());

        event_tx.send(connected_event()).await.unwrap();
        event_tx.send(submit("hello")).await.unwrap();
        event_tx
            .send(Event::TokenAppended {
                text: "hi".to_string(),
            })
            .await
            .unwrap();
        event_tx.send(Event::RequestCompleted).await.unwrap();
        drop(event_tx);

        let state = handle.await.unwrap();
        assert_eq!(
            state.messages,
            vec![
                Message::user("hello"),
                Message {
                    streaming: false,
                    ..Message::assistant_chunk("hi")
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_restore_finalizes_interrupted_stream() {
        let store = InMemoryStore::with_history(
            vec![Message::user("q"), Message::assistant_chunk("cut off")],
            Some(Theme::Light),
        );
        let state = restore_state(&store).await;

        assert!(state.streaming_message().is_none());
        assert_eq!(state.theme, Theme::Light);
        assert_eq!(state.connection, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_after_drop_mid_request_accepts_submit() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([connected_event(), submit("first"), token("partial")])
            .await;
        rt.apply([
            connection(ConnectionStatus::Disconnected),
            connection(ConnectionStatus::Connecting),
            connection(ConnectionStatus::Connected),
            submit("second"),
        ])
        .await;

        assert_eq!(rt.outbound_rx.try_recv().unwrap(), OutboundFrame::question("first"));
        assert_eq!(rt.outbound_rx.try_recv().unwrap(), OutboundFrame::question("second"));
        let state = rt.runtime.state();
        assert!(state.is_processing);
        assert!(state.messages.contains(&Message::error(CONNECTION_LOST)));
        assert_eq!(rt.store.stored_messages(), state.messages);
    }

    #[tokio::test]
    async fn test_stream_saved_once_at_completion() {
        let mut rt = TestRuntime::new(ConversationState::default());
        rt.apply([connected_event(), submit("q")]).await;
        assert_eq!(rt.store.message_saves.load(Ordering::SeqCst), 1);

        rt.apply([token("a"), token("b"), token("c")]).await;
        assert_eq!(rt.store.message_saves.load(Ordering::SeqCst), 1);

        rt.apply([Event::RequestCompleted]).await;
        assert_eq!(rt.store.message_saves.load(Ordering::SeqCst), 2);
        assert_eq!(rt.store.stored_messages()[1].as_text(), Some("abc"));
    }

    #[tokio::test]
    async fn test_shutdown_saves_unfinished_stream() {
        let rt = TestRuntime::new(ConversationState::default());
        let TestRuntime {
            runtime,
            store,
            event_tx,
            ..
        } = rt;
        let handle = tokio::spawn(runtime.run());

        event_tx.send(connected_event()).await.unwrap();
        event_tx.send(submit("q")).await.unwrap();
        event_tx.send(token("cut ")).await.unwrap();
        event_tx.send(token("off")).await.unwrap();
        drop(event_tx);
        let state = handle.await.unwrap();

        assert_eq!(store.stored_messages(), state.messages);
        assert_eq!(store.stored_messages()[1].as_text(), Some("cut off"));
        assert_eq!(store.message_saves.load(Ordering::SeqCst), 2);
    }
}
