//! Property-based tests for the reducer
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::StepStatus;
use super::*;
use crate::protocol::WebResultEntry;
use proptest::prelude::*;
use std::collections::HashMap;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_step_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("retrieve".to_string()),
        Just("grade_documents".to_string()),
        Just("web_search".to_string()),
        Just("generate".to_string()),
    ]
}

fn arb_connection() -> impl Strategy<Value = ConnectionStatus> {
    prop_oneof![
        Just(ConnectionStatus::Disconnected),
        Just(ConnectionStatus::Connecting),
        Just(ConnectionStatus::Connected),
    ]
}

fn arb_entry() -> impl Strategy<Value = WebResultEntry> {
    ("[A-Za-z ]{1,12}", "[a-z]{1,8}").prop_map(|(title, url)| WebResultEntry::new(title, url))
}

fn arb_step_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_step_name().prop_map(|name| Event::StepStarted { name }),
        arb_step_name().prop_map(|name| Event::StepEnded { name }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{0,20}".prop_map(|text| Event::Submit { text }),
        Just(Event::ToggleTheme),
        arb_connection().prop_map(|status| Event::ConnectionChanged { status }),
        arb_step_event(),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::TokenAppended { text }),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::StatusPosted { text }),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::SummaryPosted { text }),
        proptest::collection::vec(arb_entry(), 0..3)
            .prop_map(|entries| Event::WebResultsPosted { entries }),
        Just(Event::RequestCompleted),
        "[a-zA-Z ]{0,10}".prop_map(|message| Event::RequestFailed { message }),
    ]
}

/// Events the backend sends before generation starts
fn arb_preamble_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_step_event(),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::StatusPosted { text }),
        "[a-zA-Z ]{0,10}".prop_map(|text| Event::SummaryPosted { text }),
        proptest::collection::vec(arb_entry(), 0..3)
            .prop_map(|entries| Event::WebResultsPosted { entries }),
    ]
}

/// Events the backend interleaves with generated tokens
fn arb_generation_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => "[a-zA-Z ]{0,10}".prop_map(|text| Event::TokenAppended { text }),
        1 => arb_step_event(),
        1 => "[a-zA-Z ]{0,10}".prop_map(|text| Event::StatusPosted { text }),
    ]
}

/// One successful request as the backend orders it
fn arb_turn() -> impl Strategy<Value = Vec<Event>> {
    (
        "[a-zA-Z]{1,10}",
        proptest::collection::vec(arb_preamble_event(), 0..5),
        proptest::collection::vec(arb_generation_event(), 0..8),
    )
        .prop_map(|(text, preamble, generation)| {
            let mut events = vec![Event::Submit { text }];
            events.extend(preamble);
            events.extend(generation);
            events.push(Event::RequestCompleted);
            events
        })
}

fn arb_state() -> impl Strategy<Value = ConversationState> {
    proptest::collection::vec(arb_event(), 0..15).prop_map(|events| {
        events.into_iter().fold(
            ConversationState {
                connection: ConnectionStatus::Connected,
                ..ConversationState::default()
            },
            |state, event| transition(&state, event).new_state,
        )
    })
}

// ============================================================================
// State Validity Checkers
// ============================================================================

fn streaming_is_unique_and_last(state: &ConversationState) -> bool {
    let streaming: Vec<usize> = state
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.streaming)
        .map(|(i, _)| i)
        .collect();
    match streaming.as_slice() {
        [] => true,
        [index] => *index + 1 == state.messages.len(),
        _ => false,
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Completed steps per name never exceed started steps per name
    #[test]
    fn prop_completed_never_exceeds_started(events in proptest::collection::vec(arb_step_event(), 0..40)) {
        let mut state = ConversationState::default();
        let mut started: HashMap<String, usize> = HashMap::new();

        for event in events {
            if let Event::StepStarted { name } = &event {
                *started.entry(name.clone()).or_default() += 1;
            }
            state = transition(&state, event).new_state;

            for (name, count) in &started {
                let completed = state
                    .steps
                    .iter()
                    .filter(|s| &s.name == name && s.status == StepStatus::Completed)
                    .count();
                prop_assert!(completed <= *count, "{name}: {completed} completed > {count} started");
            }
        }
    }

    // In well-ordered successful turns at most one message streams, and it is last
    #[test]
    fn prop_single_trailing_stream(turns in proptest::collection::vec(arb_turn(), 0..5)) {
        let mut state = ConversationState {
            connection: ConnectionStatus::Connected,
            ..ConversationState::default()
        };
        for event in turns.into_iter().flatten() {
            state = transition(&state, event).new_state;
            prop_assert!(streaming_is_unique_and_last(&state), "Invalid streaming layout: {:?}", state.messages);
        }
        prop_assert!(state.streaming_message().is_none());
        prop_assert!(!state.is_processing);
    }

    // Request completion always resets the request
    #[test]
    fn prop_completion_resets_request(state in arb_state()) {
        let next = transition(&state, Event::RequestCompleted).new_state;
        prop_assert!(!next.is_processing);
        prop_assert!(next.steps.is_empty());
        prop_assert!(next.active_step.is_none());
        prop_assert!(next.streaming_message().is_none());
    }

    // Failure always resets the request and ends with the error message
    #[test]
    fn prop_failure_resets_request(state in arb_state(), message in "[a-z ]{0,20}") {
        let next = transition(&state, Event::RequestFailed { message: message.clone() }).new_state;
        prop_assert!(!next.is_processing);
        prop_assert!(next.steps.is_empty());
        prop_assert_eq!(next.messages.last(), Some(&Message::error(message)));
    }

    // Every message-list change other than a streamed token asks for persistence
    #[test]
    fn prop_message_changes_persist(state in arb_state(), event in arb_event()) {
        let is_token = matches!(event, Event::TokenAppended { .. });
        let result = transition(&state, event);
        if result.new_state.messages != state.messages && !is_token {
            prop_assert!(
                result.effects.contains(&Effect::PersistMessages),
                "Messages changed without PersistMessages: {:?}",
                result.effects
            );
        }
        if result.new_state.theme != state.theme {
            prop_assert!(result.effects.contains(&Effect::PersistTheme));
        }
    }

    // Dropping the connection never leaves input locked after reconnecting
    #[test]
    fn prop_reconnect_unlocks_input(state in arb_state()) {
        let next = [
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
        ]
        .into_iter()
        .fold(state, |s, status| transition(&s, Event::ConnectionChanged { status }).new_state);

        prop_assert!(!next.is_processing);
        prop_assert!(next.accepts_input());
    }

    // Only accepted submits send frames, and they send the trimmed text
    #[test]
    fn prop_send_only_on_accepted_submit(state in arb_state(), text in "[a-zA-Z ]{0,20}") {
        let accepted = state.check_submit(&text).is_ok();
        let result = transition(&state, Event::Submit { text: text.clone() });
        let sent: Vec<_> = result
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::SendQuestion { question } => Some(question.clone()),
                _ => None,
            })
            .collect();

        if accepted {
            prop_assert_eq!(sent, vec![text.trim().to_string()]);
            prop_assert!(result.new_state.is_processing);
        } else {
            prop_assert!(sent.is_empty());
            prop_assert_eq!(result.new_state, state);
        }
    }

    // Submit then immediate completion adds exactly one user message
    #[test]
    fn prop_submit_then_complete_adds_user_message(state in arb_state(), text in "[a-zA-Z]{1,20}") {
        let state = ConversationState {
            connection: ConnectionStatus::Connected,
            is_processing: false,
            ..state
        };
        let submitted = transition(&state, Event::Submit { text: text.clone() }).new_state;
        let done = transition(&submitted, Event::RequestCompleted).new_state;

        let mut expected = state.messages.clone();
        expected.push(Message::user(text));
        prop_assert_eq!(done.messages, expected);
    }

    // Persisted history reloads identically
    #[test]
    fn prop_history_round_trip(state in arb_state()) {
        let json = serde_json::to_string(&state.messages).unwrap();
        let reloaded: Vec<Message> = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(reloaded, state.messages);
    }
}
