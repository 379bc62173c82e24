//! MCP-backed tool executor using the official rmcp SDK
//!
//! Connects to an MCP server over a Unix socket or Streamable HTTP and runs
//! VCP requests as `tools/call`. Text params are typed against the tool's
//! input schema before they are sent.

#[cfg(unix)]
use std::path::Path;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        JsonObject, Tool as McpTool,
    },
    service::RunningService,
    RoleClient, ServiceExt,
};
use serde_json::{Map, Value};
use thiserror::Error;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::dispatch::{ExecutorError, ExecutorResult, ToolExecutor};
use crate::logging::Logger;
use crate::protocol::{ParamDescriptor, ToolDescriptor};
use crate::types::{CancellationToken, ToolParams};
use crate::{log_debug, log_info};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type McpResult<T> = Result<T, McpError>;

impl From<McpError> for ExecutorError {
    fn from(err: McpError) -> Self {
        ExecutorError::unavailable(err.to_string())
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "vcp-core".to_string(),
            title: Some("VCP Stream Engine".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Executes tool requests on an MCP server
pub struct McpToolExecutor {
    client: RunningService<RoleClient, ClientInfo>,
    schemas: HashMap<String, Arc<JsonObject>>,
    logger: Arc<dyn Logger>,
}

impl McpToolExecutor {
    /// Connect over a Unix socket
    #[cfg(unix)]
    pub async fn connect_unix<P: AsRef<Path>>(
        socket_path: P,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        let path = socket_path.as_ref();
        log_info!(logger, "[McpExecutor] Connecting to Unix socket: {:?}", path);

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(stream)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        Self::initialized(client, logger).await
    }

    /// Connect over Streamable HTTP
    pub async fn connect_http(url: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        log_info!(logger, "[McpExecutor] Connecting to HTTP: {}", url);

        let transport = StreamableHttpClientTransport::from_uri(url);
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        Self::initialized(client, logger).await
    }

    async fn initialized(
        client: RunningService<RoleClient, ClientInfo>,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        let mut executor = Self {
            client,
            schemas: HashMap::new(),
            logger,
        };
        executor.refresh_tools().await?;
        log_info!(
            executor.logger,
            "[McpExecutor] Connected, {} tool(s) available",
            executor.schemas.len()
        );
        Ok(executor)
    }

    /// Fetch the server's tool list and cache input schemas
    pub async fn refresh_tools(&mut self) -> McpResult<Vec<McpTool>> {
        let tools = self.list_tools().await?;
        self.schemas = tools
            .iter()
            .map(|tool| (tool.name.to_string(), tool.input_schema.clone()))
            .collect();
        Ok(tools)
    }

    pub async fn list_tools(&self) -> McpResult<Vec<McpTool>> {
        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(result.tools)
    }

    /// Descriptors for the protocol instructions, one per server tool
    pub async fn descriptors(&self) -> McpResult<Vec<ToolDescriptor>> {
        Ok(self
            .list_tools()
            .await?
            .iter()
            .map(|tool| {
                descriptor_from_schema(
                    &tool.name,
                    tool.description.as_deref().unwrap_or_default(),
                    &tool.input_schema,
                )
            })
            .collect())
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.client.peer_info().map(|info| &info.server_info)
    }

    pub async fn close(self) -> McpResult<()> {
        log_info!(self.logger, "[McpExecutor] Closing connection");
        self.client
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn call(&self, tool_name: &str, arguments: JsonObject) -> McpResult<CallToolResult> {
        let params = CallToolRequestParams {
            meta: None,
            name: tool_name.to_owned().into(),
            arguments: Some(arguments),
            task: None,
        };

        self.client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    async fn execute(
        &self,
        tool_name: &str,
        params: &ToolParams,
        cancel: CancellationToken,
    ) -> ExecutorResult<String> {
        if !self.schemas.is_empty() && !self.schemas.contains_key(tool_name) {
            return Err(ExecutorError::UnknownTool(tool_name.to_string()));
        }

        let arguments = typed_arguments(params, self.schemas.get(tool_name).map(Arc::as_ref));
        log_debug!(
            self.logger,
            "[McpExecutor] Calling {} with {} argument(s)",
            tool_name,
            arguments.len()
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            result = self.call(tool_name, arguments) => result?,
        };

        let output = result_text(&result);
        if result.is_error.unwrap_or(false) {
            return Err(ExecutorError::failed(tool_name, output));
        }
        Ok(output)
    }
}

/// Turn text params into JSON arguments
///
/// Params whose schema type is `string` (or that have no schema entry) stay
/// strings. Others are parsed as JSON, falling back to the raw text.
pub fn typed_arguments(params: &ToolParams, schema: Option<&JsonObject>) -> JsonObject {
    let properties = schema
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object);

    params
        .iter()
        .map(|(key, text)| {
            let declared = properties
                .and_then(|p| p.get(key))
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);

            let value = match declared {
                None | Some("string") => Value::String(text.clone()),
                Some(_) => serde_json::from_str(text.trim())
                    .unwrap_or_else(|_| Value::String(text.clone())),
            };
            (key.clone(), value)
        })
        .collect::<Map<String, Value>>()
}

/// Text content of a call result, joined by newlines
///
/// Falls back to structured content, then to the raw content as JSON.
pub fn result_text(result: &CallToolResult) -> String {
    let texts: Vec<&str> = result
        .content
        .iter()
        .filter_map(|content| content.as_text().map(|t| t.text.as_str()))
        .collect();

    if !texts.is_empty() {
        return texts.join("\n");
    }
    if let Some(structured) = &result.structured_content {
        return structured.to_string();
    }
    serde_json::to_string(&result.content).unwrap_or_default()
}

/// Build a protocol descriptor from an MCP input schema
pub fn descriptor_from_schema(name: &str, description: &str, schema: &JsonObject) -> ToolDescriptor {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut descriptor = ToolDescriptor::new(name, description);
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (param, spec) in properties {
            let text = spec
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            descriptor = descriptor.with_param(if required.contains(&param.as_str()) {
                ParamDescriptor::required(param.as_str(), text)
            } else {
                ParamDescriptor::optional(param.as_str(), text)
            });
        }
    }
    descriptor
}
