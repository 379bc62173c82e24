//! Tool execution results

use serde::{Deserialize, Serialize};

/// Outcome branch of an executed tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: String },
    Failure { error: String },
}

/// Result of one executed, confirm-mode tool request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the request this result answers
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// Name of the executed tool
    #[serde(rename = "toolName")]
    pub tool_name: String,
    /// Success output or error text
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            outcome: ToolOutcome::Success {
                output: output.into(),
            },
        }
    }

    /// Create a failed tool result
    pub fn failure(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            outcome: ToolOutcome::Failure {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    /// The output on success, the error text on failure
    pub fn content(&self) -> &str {
        match &self.outcome {
            ToolOutcome::Success { output } => output,
            ToolOutcome::Failure { error } => error,
        }
    }
}
