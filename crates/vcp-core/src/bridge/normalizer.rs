//! Normalizes provider-native tool calls into canonical requests

use serde_json::Value;

use crate::types::{NativeToolCall, ToolParams, ToolRequest};

/// Default prefix of tools the provider executes on its own
pub const DEFAULT_PROVIDER_EXECUTED_PREFIX: &str = "builtin_";

/// Key used when native arguments are not a JSON object
pub const NON_OBJECT_ARGUMENT_KEY: &str = "input";

/// Converts native structured calls into [`ToolRequest`]s
#[derive(Debug, Clone)]
pub struct ProtocolBridge {
    provider_executed_prefixes: Vec<String>,
}

impl Default for ProtocolBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolBridge {
    /// Bridge with the default provider-executed prefix
    pub fn new() -> Self {
        Self {
            provider_executed_prefixes: vec![DEFAULT_PROVIDER_EXECUTED_PREFIX.to_string()],
        }
    }

    /// Replace the provider-executed prefixes
    pub fn with_provider_executed_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = String>,
    ) -> Self {
        self.provider_executed_prefixes = prefixes.into_iter().collect();
        self
    }

    pub fn provider_executed_prefixes(&self) -> &[String] {
        &self.provider_executed_prefixes
    }

    /// Whether the provider runs this tool itself
    pub fn is_provider_executed(&self, tool_name: &str) -> bool {
        self.provider_executed_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && tool_name.starts_with(prefix.as_str()))
    }

    /// Convert a native call; `None` for provider-executed tools
    pub fn from_native(&self, call: &NativeToolCall) -> Option<ToolRequest> {
        if self.is_provider_executed(&call.name) {
            return None;
        }
        Some(ToolRequest::native(
            call.id.clone(),
            call.name.clone(),
            native_params(&call.arguments),
        ))
    }
}

/// Flatten native arguments into text params
///
/// A JSON-encoded string is decoded first. Object members become params,
/// strings verbatim and every other value as compact JSON. Anything that is
/// not an object is stored under [`NON_OBJECT_ARGUMENT_KEY`].
pub fn native_params(arguments: &Value) -> ToolParams {
    let decoded;
    let arguments = match arguments {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => {
                decoded = value;
                &decoded
            }
            _ => arguments,
        },
        other => other,
    };

    let mut params = ToolParams::new();
    match arguments {
        Value::Object(map) => {
            for (key, value) in map {
                params.insert(key.clone(), value_to_text(value));
            }
        }
        Value::Null => {}
        other => {
            params.insert(NON_OBJECT_ARGUMENT_KEY.to_string(), value_to_text(other));
        }
    }
    params
}

/// Text form of a JSON value: strings unquoted, everything else serialized
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestOrigin;
    use serde_json::json;

    #[test]
    fn test_object_arguments() {
        let bridge = ProtocolBridge::new();
        let call = NativeToolCall::new(
            "call_1",
            "Search",
            json!({"query": "rust", "limit": 5, "filters": {"lang": "en", "a": [1, 2]}, "exact": true}),
        );
        let request = bridge.from_native(&call).unwrap();

        assert_eq!(request.id, "call_1");
        assert_eq!(request.origin, RequestOrigin::Native);
        assert!(request.raw_span.is_none());
        assert_eq!(request.param("query"), Some("rust"));
        assert_eq!(request.param("limit"), Some("5"));
        assert_eq!(request.param("exact"), Some("true"));
        assert_eq!(request.param("filters"), Some(r#"{"a":[1,2],"lang":"en"}"#));
    }

    #[test]
    fn test_string_encoded_arguments() {
        let call = NativeToolCall::new("c", "Read", json!(r#"{"path": "/tmp/a"}"#));
        let request = ProtocolBridge::new().from_native(&call).unwrap();
        assert_eq!(request.param("path"), Some("/tmp/a"));
    }

    #[test]
    fn test_non_object_arguments() {
        let params = native_params(&json!("just text"));
        assert_eq!(params.get("input").map(String::as_str), Some("just text"));

        let params = native_params(&json!([1, 2]));
        assert_eq!(params.get("input").map(String::as_str), Some("[1,2]"));

        assert!(native_params(&Value::Null).is_empty());
    }

    #[test]
    fn test_provider_executed_carve_out() {
        let bridge = ProtocolBridge::new();
        let call = NativeToolCall::new("c", "builtin_web_search", json!({"q": "x"}));
        assert!(bridge.is_provider_executed("builtin_web_search"));
        assert!(bridge.from_native(&call).is_none());

        let custom = ProtocolBridge::new().with_provider_executed_prefixes(vec!["srv_".to_string()]);
        assert!(custom.from_native(&call).is_some());
        assert!(!custom.is_provider_executed("Search"));
        assert!(custom.is_provider_executed("srv_fetch"));
    }

    #[test]
    fn test_empty_prefix_matches_nothing() {
        let bridge = ProtocolBridge::new().with_provider_executed_prefixes(vec![String::new()]);
        assert!(!bridge.is_provider_executed("anything"));
    }

    #[test]
    fn test_native_archery_flag() {
        let call = NativeToolCall::new("c", "Notify", json!({"msg": "hi", "archery": true}));
        let request = ProtocolBridge::new().from_native(&call).unwrap();
        assert!(request.fire_and_forget);
        assert_eq!(request.param("archery"), Some("true"));
    }
}
