//! Events that can occur in a conversation

use crate::protocol::WebResultEntry;
use crate::state_machine::state::ConnectionStatus;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User actions
    Submit {
        text: String,
    },
    ToggleTheme,

    // Transport
    ConnectionChanged {
        status: ConnectionStatus,
    },

    // Backend events
    StepStarted {
        name: String,
    },
    StepEnded {
        name: String,
    },
    TokenAppended {
        text: String,
    },
    StatusPosted {
        text: String,
    },
    SummaryPosted {
        text: String,
    },
    WebResultsPosted {
        entries: Vec<WebResultEntry>,
    },
    RequestCompleted,
    RequestFailed {
        message: String,
    },
}

impl Event {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Submit { .. } => "submit",
            Event::ToggleTheme => "toggle_theme",
            Event::ConnectionChanged { .. } => "connection_changed",
            Event::StepStarted { .. } => "step_started",
            Event::StepEnded { .. } => "step_ended",
            Event::TokenAppended { .. } => "token_appended",
            Event::StatusPosted { .. } => "status_posted",
            Event::SummaryPosted { .. } => "summary_posted",
            Event::WebResultsPosted { .. } => "web_results_posted",
            Event::RequestCompleted => "request_completed",
            Event::RequestFailed { .. } => "request_failed",
        }
    }
}
