//! Concrete tool executor backends
//!
//! - `McpToolExecutor`: tools served by an MCP server (rmcp client)
//! - `PluginExecutor`: local commands speaking the stdio JSON plugin protocol
//!
//! Closure-backed executors live in [`crate::dispatch::FnExecutor`].

mod mcp;
mod plugin;

pub use mcp::{
    descriptor_from_schema, result_text, typed_arguments, McpError, McpResult, McpToolExecutor,
};
pub use plugin::{PluginError, PluginExecutor, PluginResult, PluginSpec};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{CallToolResult as McpToolResult, Tool as McpTool};
