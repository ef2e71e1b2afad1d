//! Wire format shared with the Aegis backend
//!
//! Inbound frames are JSON objects discriminated by `type`; the only
//! outbound frame is `{"question": "..."}`.

use crate::state_machine::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Step name reported for `retriever_start`
pub const RETRIEVER_STEP: &str = "retriever";
/// Step name reported for `tool_start`
pub const WEB_SEARCH_STEP: &str = "web_search";
/// Step name reported for `llm_start`
pub const LLM_STEP: &str = "llm";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// One web search hit, as sent in `web_search_results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResultEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[cfg(test)]
impl WebResultEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// A server-to-client frame
///
/// Payload fields stay untyped so a frame with an odd payload still decodes;
/// the conversion to [`Event`] degrades bad payloads to empty content.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub node: Value,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub data: Value,
}

impl InboundFrame {
    /// Map the frame onto a reducer event. `None` for unknown frame types.
    pub fn to_event(&self) -> Option<Event> {
        let event = match self.frame_type.as_str() {
            "step_start" => Event::StepStarted {
                name: text_of(&self.node),
            },
            "retriever_start" => Event::StepStarted {
                name: RETRIEVER_STEP.to_string(),
            },
            "tool_start" => Event::StepStarted {
                name: WEB_SEARCH_STEP.to_string(),
            },
            "llm_start" => Event::StepStarted {
                name: LLM_STEP.to_string(),
            },
            "stream" => Event::TokenAppended {
                text: text_of(&self.data),
            },
            "status" => Event::StatusPosted {
                text: text_of(&self.data),
            },
            "summary" => Event::SummaryPosted {
                text: text_of(&self.data),
            },
            "web_search_results" => Event::WebResultsPosted {
                entries: entries_of(&self.data),
            },
            "step_end" | "tool_end" | "retriever_end" => Event::StepEnded {
                name: self.ended_step_name(),
            },
            "end" => Event::RequestCompleted,
            "error" => Event::RequestFailed {
                message: text_of(&self.data),
            },
            _ => return None,
        };
        Some(event)
    }

    /// `node` wins over `name`; an empty `node` falls through
    fn ended_step_name(&self) -> String {
        let node = text_of(&self.node);
        if node.is_empty() {
            text_of(&self.name)
        } else {
            node
        }
    }
}

/// The client-to-server frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub question: String,
}

impl OutboundFrame {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse one text frame
pub fn decode_frame(text: &str) -> Result<InboundFrame, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

fn text_of(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn entries_of(value: &Value) -> Vec<WebResultEntry> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}
