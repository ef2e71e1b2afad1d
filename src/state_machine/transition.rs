//! Pure state transition function
//!
//! Every event maps to exactly one case below. Transitions never fail:
//! an event that does not apply leaves the state untouched.

use super::state::{ConnectionStatus, ConversationState, Message, MessageKind, StepStatus};
use super::{Effect, Event, Step};
use thiserror::Error;

/// Error text for a request whose connection dropped before it ended
pub const CONNECTION_LOST: &str = "Connection lost before the answer finished";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// No-op transition
    pub fn unchanged(state: &ConversationState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Why a submit was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("question is empty")]
    Empty,
    #[error("not connected to the backend")]
    Disconnected,
    #[error("a request is already in flight")]
    Busy,
}

impl ConversationState {
    /// Check the submit preconditions; yields the trimmed question
    pub fn check_submit<'a>(&self, text: &'a str) -> Result<&'a str, SubmitRejection> {
        let question = text.trim();
        if question.is_empty() {
            Err(SubmitRejection::Empty)
        } else if !self.is_connected() {
            Err(SubmitRejection::Disconnected)
        } else if self.is_processing {
            Err(SubmitRejection::Busy)
        } else {
            Ok(question)
        }
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(state: &ConversationState, event: Event) -> TransitionResult {
    match event {
        // ============================================================
        // User actions
        // ============================================================

        // Accepted: user message appended, request in flight, steps reset
        Event::Submit { text } => match state.check_submit(&text) {
            Ok(question) => {
                let mut next = state.clone();
                next.messages.push(Message::user(question));
                next.is_processing = true;
                next.steps.clear();
                TransitionResult::new(next)
                    .with_effect(Effect::PersistMessages)
                    .with_effect(Effect::send_question(question))
            }
            Err(_) => TransitionResult::unchanged(state),
        },

        Event::ToggleTheme => {
            let mut next = state.clone();
            next.theme = state.theme.toggled();
            TransitionResult::new(next).with_effect(Effect::PersistTheme)
        }

        // ============================================================
        // Transport
        // ============================================================

        // The backend ties a request to its socket, so losing the socket
        // orphans the request; nothing would ever end it otherwise
        Event::ConnectionChanged { status } => {
            let mut next = state.clone();
            next.connection = status;
            if status == ConnectionStatus::Disconnected && state.is_processing {
                fail_request(&mut next, CONNECTION_LOST);
                return TransitionResult::new(next).with_effect(Effect::PersistMessages);
            }
            TransitionResult::new(next)
        }

        // ============================================================
        // Steps
        // ============================================================

        // Repeated starts of one name produce separate entries
        Event::StepStarted { name } => {
            let mut next = state.clone();
            next.active_step = Some(name.clone());
            next.steps.push(Step::running(name));
            TransitionResult::new(next)
        }

        // Earliest running step with the name completes
        Event::StepEnded { name } => {
            let Some(index) = state
                .steps
                .iter()
                .position(|s| s.name == name && s.is_running())
            else {
                return TransitionResult::unchanged(state);
            };
            let mut next = state.clone();
            next.steps[index].status = StepStatus::Completed;
            TransitionResult::new(next)
        }

        // ============================================================
        // Conversation content
        // ============================================================

        // Post: no status messages; last message is a streaming assistant
        // message ending in `text`. Not persisted per token: the next
        // message-changing event or runtime shutdown writes the stream.
        Event::TokenAppended { text } => {
            let mut next = state.clone();
            drop_status(&mut next.messages);
            match next.messages.last_mut() {
                Some(last) if last.is_streaming_assistant() => last.push_text(&text),
                _ => next.messages.push(Message::assistant_chunk(text)),
            }
            TransitionResult::new(next)
        }

        // Post: exactly one status message, last; no streaming assistant text.
        // This includes a partial answer left streaming by an earlier failure.
        Event::StatusPosted { text } => {
            let mut next = state.clone();
            next.messages
                .retain(|m| m.kind != MessageKind::Status && !m.is_streaming_assistant());
            next.messages.push(Message::status(text));
            TransitionResult::new(next).with_effect(Effect::PersistMessages)
        }

        Event::SummaryPosted { text } => {
            let mut next = state.clone();
            next.messages.push(Message::summary(text));
            TransitionResult::new(next).with_effect(Effect::PersistMessages)
        }

        // Post: no status messages; results last
        Event::WebResultsPosted { entries } => {
            let mut next = state.clone();
            drop_status(&mut next.messages);
            next.messages.push(Message::web_results(entries));
            TransitionResult::new(next).with_effect(Effect::PersistMessages)
        }

        // ============================================================
        // Terminal events
        // ============================================================

        // The only place a stream is finalized
        Event::RequestCompleted => {
            let mut next = state.clone();
            end_request(&mut next);
            let finalized = match next.messages.last_mut() {
                Some(last) if last.streaming => {
                    last.streaming = false;
                    true
                }
                _ => false,
            };
            let result = TransitionResult::new(next);
            if finalized {
                result.with_effect(Effect::PersistMessages)
            } else {
                result
            }
        }

        // A trailing streaming message keeps its flag
        Event::RequestFailed { message } => {
            let mut next = state.clone();
            fail_request(&mut next, message);
            TransitionResult::new(next).with_effect(Effect::PersistMessages)
        }
    }
}

// Helper functions

fn drop_status(messages: &mut Vec<Message>) {
    messages.retain(|m| m.kind != MessageKind::Status);
}

fn end_request(state: &mut ConversationState) {
    state.is_processing = false;
    state.active_step = None;
    state.steps.clear();
}

fn fail_request(state: &mut ConversationState, message: impl Into<String>) {
    end_request(state);
    state.messages.push(Message::error(message));
}
