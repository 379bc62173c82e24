//! Streaming event types
//!
//! [`ProviderEvent`] is what a completion provider feeds into the engine,
//! [`TurnEvent`] is what the engine yields to the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::ToolParams;
use super::tool::NativeToolCall;

/// Event produced by a model provider stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// Text content delta
    TextDelta { text: String },
    /// Complete native tool call
    NativeToolCall {
        #[serde(rename = "toolCall")]
        tool_call: NativeToolCall,
    },
    /// Result of a tool the provider executed itself
    NativeToolResult {
        id: String,
        name: String,
        output: Value,
    },
    /// Error of a tool the provider executed itself
    NativeToolError {
        id: String,
        name: String,
        message: String,
    },
}

impl ProviderEvent {
    /// Create a text delta
    pub fn text(text: impl Into<String>) -> Self {
        ProviderEvent::TextDelta { text: text.into() }
    }

    /// Create a native tool call event
    pub fn tool_call(tool_call: NativeToolCall) -> Self {
        ProviderEvent::NativeToolCall { tool_call }
    }

    /// Get the text if this is a text delta
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ProviderEvent::TextDelta { text } => Some(text),
            _ => None,
        }
    }
}

/// Event yielded to the host for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Visible assistant text, protocol blocks already stripped
    Text { text: String },
    /// A tool request was detected and is awaiting confirmation or dispatch
    ToolPending {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        params: ToolParams,
        #[serde(rename = "fireAndForget")]
        fire_and_forget: bool,
    },
    /// A tool finished (or was dispatched, for fire-and-forget)
    ToolDone {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        params: ToolParams,
        output: String,
    },
    /// A confirmed tool failed
    ToolError {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        params: ToolParams,
        error: String,
    },
    /// A tool was cancelled before execution
    ToolCancelled {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        params: ToolParams,
    },
    /// Provider event the engine does not act on (provider-executed tools)
    NativePassthrough { event: ProviderEvent },
    /// Tool results were pending but the continuation limit was hit
    RoundLimitReached {
        /// The configured continuation limit
        rounds: usize,
    },
    /// Terminal turn-level error
    Error { message: String },
    /// Final accumulated text for the turn
    Finished {
        /// Visible text of every round, joined by a blank line
        text: String,
        /// Number of rounds streamed, the initial one included
        rounds: usize,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        aborted: bool,
    },
}

impl TurnEvent {
    /// Create a text event
    pub fn text(text: impl Into<String>) -> Self {
        TurnEvent::Text { text: text.into() }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        TurnEvent::Error {
            message: message.into(),
        }
    }

    /// Get the text if this is a text event
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TurnEvent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Request id for tool lifecycle events
    pub fn request_id(&self) -> Option<&str> {
        match self {
            TurnEvent::ToolPending { request_id, .. }
            | TurnEvent::ToolDone { request_id, .. }
            | TurnEvent::ToolError { request_id, .. }
            | TurnEvent::ToolCancelled { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Whether this event ends the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Error { .. } | TurnEvent::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_text_event() {
        let event = ProviderEvent::text("Hello");
        assert_eq!(event.as_text(), Some("Hello"));

        let call = ProviderEvent::tool_call(NativeToolCall::new("c1", "f", json!({})));
        assert_eq!(call.as_text(), None);
    }

    #[test]
    fn test_turn_event_serialization() {
        let event = TurnEvent::ToolCancelled {
            request_id: "vcp-0-1".to_string(),
            tool_name: "Write".to_string(),
            params: ToolParams::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tool_cancelled\""));
        assert!(json.contains("\"requestId\":\"vcp-0-1\""));
        assert_eq!(event.request_id(), Some("vcp-0-1"));
    }

    #[test]
    fn test_finished_omits_aborted_when_false() {
        let event = TurnEvent::Finished {
            text: "done".to_string(),
            rounds: 1,
            aborted: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("aborted"));
        assert!(event.is_terminal());
        assert!(!TurnEvent::text("x").is_terminal());
    }
}
