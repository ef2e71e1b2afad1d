//! Front-end local state: the input line and the scroll position

use crate::state_machine::ConversationState;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Lines moved per PgUp/PgDn
const PAGE: u16 = 10;

/// Starter questions offered on an empty conversation
pub const SUGGESTIONS: [&str; 4] = [
    "How do I use the latest LangChain API?",
    "What are the current best practices for RAG?",
    "How to implement streaming with OpenAI?",
    "Explain vector databases in 2025",
];

/// Whether the welcome panel with suggestions is showing
pub fn shows_welcome(state: &ConversationState) -> bool {
    state.messages.is_empty() && !state.is_processing
}

/// What a key press asks of the rest of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Submit(String),
    ToggleTheme,
    Quit,
}

#[derive(Debug, Default)]
pub struct App {
    pub input: String,
    /// Lines scrolled up from the bottom of the conversation
    pub scroll: u16,
    /// Suggestion currently copied into the input, if untouched since
    pub suggestion: Option<usize>,
}

impl App {
    pub fn handle_key(&mut self, key: KeyEvent, state: &ConversationState) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') if ctrl => Action::Quit,
            KeyCode::Char('t') if ctrl => Action::ToggleTheme,
            KeyCode::Enter => self.submit(state),
            KeyCode::Tab if shows_welcome(state) => {
                self.cycle_suggestion(true);
                Action::None
            }
            KeyCode::BackTab if shows_welcome(state) => {
                self.cycle_suggestion(false);
                Action::None
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.suggestion = None;
                Action::None
            }
            KeyCode::Char(c) if !ctrl => {
                self.input.push(c);
                self.suggestion = None;
                Action::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_add(PAGE);
                Action::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_sub(PAGE);
                Action::None
            }
            KeyCode::End => {
                self.scroll = 0;
                Action::None
            }
            _ => Action::None,
        }
    }

    /// Hand the input over only when it would be accepted; otherwise keep it
    fn submit(&mut self, state: &ConversationState) -> Action {
        if !state.accepts_input() || self.input.trim().is_empty() {
            return Action::None;
        }
        self.scroll = 0;
        self.suggestion = None;
        Action::Submit(std::mem::take(&mut self.input))
    }

    /// Copy the next (or previous) suggestion into the input
    fn cycle_suggestion(&mut self, forward: bool) {
        let count = SUGGESTIONS.len();
        let next = match (self.suggestion, forward) {
            (None, true) => 0,
            (None, false) => count - 1,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        };
        self.suggestion = Some(next);
        self.input = SUGGESTIONS[next].to_string();
    }
}
