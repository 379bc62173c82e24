//! Adapter between VCP types and genai types
//!
//! Text deltas become [`ProviderEvent::TextDelta`]. Native tool calls are
//! captured by genai and surfaced, all of them, when the stream ends.
//!
//! Auth comes from the model config's explicit key, falling back to the
//! provider's `<PROVIDER>_API_KEY` environment variable.

use std::future::Future;
use std::pin::Pin;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, ChatRole as GenaiRole,
    ChatStreamEvent, MessageContent as GenaiContent, Tool as GenaiTool,
    ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};

use crate::types::{ChatMessage, MessageRole, NativeToolCall, ProviderEvent, Tool};

use super::traits::{ProviderModelConfig, StreamChatOptions};

// ============================================================================
// Message Conversion: vcp -> genai
// ============================================================================

/// Convert a MessageRole to genai ChatRole
pub fn to_genai_role(role: MessageRole) -> GenaiRole {
    match role {
        MessageRole::System => GenaiRole::System,
        MessageRole::User => GenaiRole::User,
        MessageRole::Assistant => GenaiRole::Assistant,
    }
}

/// Convert a ChatMessage to genai ChatMessage
pub fn to_genai_message(msg: ChatMessage) -> GenaiMessage {
    let content = GenaiContent::from(msg.content);
    match msg.role {
        MessageRole::System => GenaiMessage::system(content),
        MessageRole::User => GenaiMessage::user(content),
        MessageRole::Assistant => GenaiMessage::assistant(content),
    }
}

/// Convert a conversation to genai messages
pub fn to_genai_messages(messages: Vec<ChatMessage>) -> Vec<GenaiMessage> {
    messages.into_iter().map(to_genai_message).collect()
}

// ============================================================================
// Tool Conversion: vcp -> genai
// ============================================================================

/// Convert a Tool to genai Tool
pub fn to_genai_tool(tool: Tool) -> GenaiTool {
    let mut genai_tool = GenaiTool::new(&tool.name).with_description(&tool.description);

    if let Some(schema) = tool.input_schema {
        genai_tool = genai_tool.with_schema(schema);
    }

    genai_tool
}

/// Convert tools to genai tools
pub fn to_genai_tools(tools: Vec<Tool>) -> Vec<GenaiTool> {
    tools.into_iter().map(to_genai_tool).collect()
}

// ============================================================================
// Options Conversion: vcp -> genai
// ============================================================================

/// Convert StreamChatOptions to genai ChatOptions
pub fn to_genai_options(options: &StreamChatOptions) -> GenaiOptions {
    let mut genai_opts = GenaiOptions::default();

    if let Some(temp) = options.temperature {
        genai_opts = genai_opts.with_temperature(temp as f64);
    }

    if let Some(max_tokens) = options.max_tokens {
        genai_opts = genai_opts.with_max_tokens(max_tokens);
    }

    // Native calls are only delivered once complete, at stream end
    genai_opts = genai_opts.with_capture_tool_calls(true);

    genai_opts
}

// ============================================================================
// Response Conversion: genai -> vcp
// ============================================================================

/// Convert a genai ToolCall to a NativeToolCall
pub fn from_genai_tool_call(tc: &GenaiToolCall) -> NativeToolCall {
    NativeToolCall::new(tc.call_id.clone(), tc.fn_name.clone(), tc.fn_arguments.clone())
}

/// Convert a genai stream event to provider events
///
/// Partial tool-call chunks are skipped; the captured calls arrive with the
/// end event.
pub fn from_genai_event(event: ChatStreamEvent) -> Vec<ProviderEvent> {
    match event {
        ChatStreamEvent::Chunk(chunk) if !chunk.content.is_empty() => {
            vec![ProviderEvent::text(chunk.content)]
        }
        ChatStreamEvent::End(end) => end
            .captured_tool_calls()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| ProviderEvent::tool_call(from_genai_tool_call(tc)))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Provider Resolution
// ============================================================================

/// Provider configuration for routing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier (e.g., "openai", "openrouter")
    pub provider: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl From<&ProviderModelConfig> for ProviderConfig {
    fn from(config: &ProviderModelConfig) -> Self {
        // Extract provider from model name if prefixed (e.g., "openai/gpt-4")
        let provider = config
            .model
            .split('/')
            .next()
            .unwrap_or("openai")
            .to_string();

        Self {
            provider,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
        }
    }
}

/// Environment variable holding a provider's API key
pub fn provider_api_key_env(provider: &str) -> String {
    match provider.to_lowercase().as_str() {
        "gemini" | "google" => "GEMINI_API_KEY".to_string(),
        "azure" => "AZURE_OPENAI_API_KEY".to_string(),
        other => format!("{}_API_KEY", other.to_uppercase()),
    }
}

/// Environment variable holding the API key for a genai adapter
pub fn adapter_kind_api_key_env(adapter: AdapterKind) -> String {
    match adapter {
        AdapterKind::OpenAI => "OPENAI_API_KEY".to_string(),
        AdapterKind::Anthropic => "ANTHROPIC_API_KEY".to_string(),
        AdapterKind::Gemini => "GEMINI_API_KEY".to_string(),
        AdapterKind::Groq => "GROQ_API_KEY".to_string(),
        AdapterKind::DeepSeek => "DEEPSEEK_API_KEY".to_string(),
        _ => format!("{:?}_API_KEY", adapter).to_uppercase(),
    }
}

// ============================================================================
// Client Creation with Custom Auth
// ============================================================================

/// Create a genai Client with explicit-key auth and endpoint resolution
pub fn create_client(config: &ProviderConfig) -> Client {
    let auth_provider = config.provider.clone();
    let auth_explicit_key = config.api_key.clone();

    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let provider = auth_provider.clone();
            let explicit_key = auth_explicit_key.clone();
            let adapter_kind = model_iden.adapter_kind;

            Box::pin(async move {
                if let Some(key) = explicit_key {
                    return Ok(Some(AuthData::from_single(key)));
                }

                let env_key = if provider.is_empty() {
                    adapter_kind_api_key_env(adapter_kind)
                } else {
                    provider_api_key_env(&provider)
                };

                // No key is fine for local providers such as Ollama
                Ok(std::env::var(env_key).ok().map(AuthData::from_single))
            })
        },
    );

    let target_provider = config.provider.clone();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { ref model, .. } = target;

            let custom_base = target_api_base
                .as_ref()
                .map(|u| Endpoint::from_owned(u.clone()));

            // OpenAI-compatible providers routed through the OpenAI adapter
            let endpoint = match target_provider.as_str() {
                "azure" => custom_base.unwrap_or_else(|| {
                    Endpoint::from_static("https://your-resource.openai.azure.com/")
                }),
                "openrouter" => Endpoint::from_static("https://openrouter.ai/api/v1/"),
                "mistral" => Endpoint::from_static("https://api.mistral.ai/v1/"),
                "openai_compat" => match custom_base {
                    Some(endpoint) => endpoint,
                    None => return Ok(target),
                },
                // Native genai providers - let it resolve normally
                _ => return Ok(target),
            };

            let resolved_model = ModelIden::new(AdapterKind::OpenAI, model.model_name.clone());

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: resolved_model,
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}

/// Check if a provider is natively supported by genai
pub fn is_genai_native(provider: &str) -> bool {
    matches!(
        provider.to_lowercase().as_str(),
        "openai"
            | "anthropic"
            | "gemini"
            | "ollama"
            | "groq"
            | "xai"
            | "deepseek"
            | "cohere"
            | "fireworks"
            | "together"
    )
}

/// Check if a provider can be handled by genai (native or via OpenAI-compat)
pub fn is_genai_supported(provider: &str) -> bool {
    is_genai_native(provider)
        || matches!(
            provider.to_lowercase().as_str(),
            "azure" | "openrouter" | "mistral" | "openai_compat"
        )
}
