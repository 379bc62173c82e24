//! System-prompt instructions that teach a model the VCP syntax

use serde::{Deserialize, Serialize};

use super::grammar::encode_request;
use crate::types::ToolParams;

/// Description of one tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParamDescriptor {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Description of a tool offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Example invocation with placeholder values
    pub fn example(&self) -> String {
        let params: ToolParams = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| (p.name.clone(), format!("<{}>", p.name)))
            .collect();
        encode_request(&self.name, &params)
    }
}

/// Build the protocol section to append to a system prompt
pub fn build_protocol_instructions(tools: &[ToolDescriptor]) -> String {
    let mut tool_descriptions = String::new();

    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n{}\n", tool.name, tool.description));
        if !tool.params.is_empty() {
            tool_descriptions.push_str("Parameters:\n");
            for param in &tool.params {
                let marker = if param.required { "required" } else { "optional" };
                tool_descriptions.push_str(&format!(
                    "  - `{}` ({}): {}\n",
                    param.name, marker, param.description
                ));
            }
        }
        tool_descriptions.push_str(&format!("Example:\n{}\n\n", tool.example()));
    }

    let mut params = ToolParams::new();
    params.insert("param".to_string(), "value".to_string());
    let example = encode_request("ToolName", &params);

    params.insert("archery".to_string(), "true".to_string());
    let archery_example = encode_request("ToolName", &params);

    format!(
        r#"## Tool Calling

To call a tool, write a tool request block anywhere in your reply:

{example}

Rules:
- Wrap every value in 「始」 and 「末」. Do not quote or escape anything inside them.
- Separate fields with a comma or a newline.
- You may emit several blocks in one reply; they run in the order written.
- Add `archery:「始」true「末」` when you do not need the result. The call runs in the background:

{archery_example}

- After a block that needs a result, stop and wait; results arrive in the next message.
- Never invent tool results.

## Available Tools

{tool_descriptions}"#,
        example = example,
        archery_example = archery_example,
        tool_descriptions = tool_descriptions,
    )
}
