//! Canonical tool request shape shared by textual and native invocations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tool parameters: key to opaque text value
pub type ToolParams = BTreeMap<String, String>;

/// Param keys that mark a request as fire-and-forget
pub const FIRE_AND_FORGET_KEYS: [&str; 2] = ["no_reply", "archery"];

/// Byte range of a matched block inside the stream buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpan {
    pub start: usize,
    pub end: usize,
}

impl RawSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Where a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    /// Detected in the model's text output
    Text,
    /// Bridged from a provider-native structured call
    Native,
}

/// One detected or bridged tool invocation
///
/// Requests are immutable once built; the dispatcher consumes them and only
/// the resulting [`ToolResult`](super::ToolResult) outlives execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Identifier, unique within a turn
    pub id: String,
    /// Name of the tool to execute
    #[serde(rename = "toolName")]
    pub tool_name: String,
    /// Parameters, values kept verbatim
    pub params: ToolParams,
    /// Span of the block in the buffer at detection time (textual requests only)
    #[serde(rename = "rawSpan", skip_serializing_if = "Option::is_none")]
    pub raw_span: Option<RawSpan>,
    /// Caller does not wait for or record the result
    #[serde(rename = "fireAndForget")]
    pub fire_and_forget: bool,
    /// Textual or native
    pub origin: RequestOrigin,
}

impl ToolRequest {
    /// Build a request detected in text
    pub fn textual(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        params: ToolParams,
        span: RawSpan,
    ) -> Self {
        let fire_and_forget = is_fire_and_forget(&params);
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            params,
            raw_span: Some(span),
            fire_and_forget,
            origin: RequestOrigin::Text,
        }
    }

    /// Build a request bridged from a native call
    pub fn native(id: impl Into<String>, tool_name: impl Into<String>, params: ToolParams) -> Self {
        let fire_and_forget = is_fire_and_forget(&params);
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            params,
            raw_span: None,
            fire_and_forget,
            origin: RequestOrigin::Native,
        }
    }

    /// Get a parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Check whether the params carry an archery / no-reply flag set to true
pub fn is_fire_and_forget(params: &ToolParams) -> bool {
    FIRE_AND_FORGET_KEYS
        .iter()
        .filter_map(|key| params.get(*key))
        .any(|value| is_true_flag(value))
}

fn is_true_flag(value: &str) -> bool {
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ToolParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_archery_flag_variants() {
        assert!(is_fire_and_forget(&params(&[("archery", "true")])));
        assert!(is_fire_and_forget(&params(&[("no_reply", "\"true\"")])));
        assert!(is_fire_and_forget(&params(&[("no_reply", " TRUE ")])));
        assert!(!is_fire_and_forget(&params(&[("archery", "false")])));
        assert!(!is_fire_and_forget(&params(&[("reply", "true")])));
        assert!(!is_fire_and_forget(&ToolParams::new()));
    }

    #[test]
    fn test_textual_request_keeps_flag_param() {
        let req = ToolRequest::textual(
            "vcp-0-1",
            "Notify",
            params(&[("archery", "true"), ("msg", "hi")]),
            RawSpan::new(4, 40),
        );
        assert!(req.fire_and_forget);
        assert_eq!(req.param("archery"), Some("true"));
        assert_eq!(req.origin, RequestOrigin::Text);
        assert_eq!(req.raw_span.map(|s| s.len()), Some(36));
    }

    #[test]
    fn test_native_request_has_no_span() {
        let req = ToolRequest::native("call_9", "Search", params(&[("q", "rust")]));
        assert!(req.raw_span.is_none());
        assert!(!req.fire_and_forget);
        assert_eq!(req.origin, RequestOrigin::Native);
    }
}
