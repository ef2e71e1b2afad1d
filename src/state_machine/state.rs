//! Conversation state types

use crate::protocol::WebResultEntry;
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// What a conversation entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    /// Transient progress line from the backend
    Status,
    /// Markdown summary of retrieved material
    Summary,
    WebResults,
    Error,
}

/// Message body
///
/// Stored untagged so persisted history keeps the plain
/// `"content": "..."` / `"content": [...]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    WebResults(Vec<WebResultEntry>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// One entry of the conversation, in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Older histories store errors without content
    #[serde(default)]
    pub content: MessageContent,
    /// Assistant text still receiving tokens
    #[serde(default, skip_serializing_if = "is_false")]
    pub streaming: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde passes by reference
fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    fn text(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            content: MessageContent::Text(text.into()),
            streaming: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(MessageKind::User, text)
    }

    /// First chunk of a streamed assistant reply
    pub fn assistant_chunk(text: impl Into<String>) -> Self {
        Self {
            streaming: true,
            ..Self::text(MessageKind::Assistant, text)
        }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::text(MessageKind::Status, text)
    }

    pub fn summary(text: impl Into<String>) -> Self {
        Self::text(MessageKind::Summary, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::text(MessageKind::Error, text)
    }

    pub fn web_results(entries: Vec<WebResultEntry>) -> Self {
        Self {
            kind: MessageKind::WebResults,
            content: MessageContent::WebResults(entries),
            streaming: false,
        }
    }

    pub fn is_streaming_assistant(&self) -> bool {
        self.kind == MessageKind::Assistant && self.streaming
    }

    /// Text body, if this message carries text
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::WebResults(_) => None,
        }
    }

    /// Append a streamed chunk to a text body
    pub(crate) fn push_text(&mut self, chunk: &str) {
        match &mut self.content {
            MessageContent::Text(text) => text.push_str(chunk),
            MessageContent::WebResults(_) => self.content = MessageContent::Text(chunk.to_string()),
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
}

/// One backend processing stage of the in-flight request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
}

impl Step {
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == StepStatus::Running
    }

    /// Human readable label for the progress panel
    pub fn label(&self) -> &str {
        match self.name.as_str() {
            "retrieve" => "Retrieving documents",
            "grade_documents" => "Grading relevance",
            "transform_query" => "Optimizing query",
            "web_search" => "Searching web",
            "generate" => "Generating response",
            "llm" => "LLM thinking",
            "retriever" => "Fetching knowledge",
            other => other,
        }
    }
}

// ============================================================================
// Connection and theme
// ============================================================================

/// Transport lifecycle as seen by the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Everything the front-end renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub steps: Vec<Step>,
    pub connection: ConnectionStatus,
    /// Between an accepted submit and its terminal event
    pub is_processing: bool,
    /// Most recently started step, informational only
    pub active_step: Option<String>,
    pub theme: Theme,
}

impl ConversationState {
    /// State rebuilt from storage at startup
    pub fn restored(mut messages: Vec<Message>, theme: Theme) -> Self {
        // No stream survives a restart
        for message in &mut messages {
            message.streaming = false;
        }
        Self {
            messages,
            theme,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    /// Whether a submit would currently be accepted (ignoring its text)
    pub fn accepts_input(&self) -> bool {
        self.is_connected() && !self.is_processing
    }

    /// The message still receiving tokens, if any
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.streaming)
    }
}
