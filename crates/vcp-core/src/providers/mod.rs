//! Completion providers
//!
//! A provider turns a conversation into a [`ProviderStream`] of text deltas
//! and native tool calls for one round.
//!
//! ## Architecture
//!
//! Real backends go through the `genai` crate, which handles streaming SSE
//! parsing and provider-specific protocols. OpenAI-compatible services not
//! native to genai are routed via genai's `ServiceTargetResolver`.
//!
//! The `MockProvider` plays scripted rounds for tests and demos.

mod error;
mod genai_adapter;
mod genai_provider;
mod mock;
mod traits;

pub use error::{ProviderError, ProviderResult};
pub use traits::{Provider, ProviderModelConfig, ProviderStream, StreamChatOptions};

pub use genai_adapter::{is_genai_native, is_genai_supported, provider_api_key_env, ProviderConfig};
pub use genai_provider::GenaiProvider;

pub use mock::{MockConfig, MockMode, MockProvider, MockRound, MockStep};

use crate::logging::Logger;
use std::sync::Arc;

/// Create a provider for the given provider ID
///
/// `mock` yields an echoing [`MockProvider`]; everything else goes through
/// [`GenaiProvider`], which treats unknown IDs as OpenAI-compatible.
pub fn create_provider(provider_id: &str, logger: Arc<dyn Logger>) -> Box<dyn Provider> {
    match provider_id.to_lowercase().as_str() {
        "mock" => Box::new(MockProvider::echo(logger)),
        _ => Box::new(GenaiProvider::new(provider_id, logger)),
    }
}

/// List all supported provider IDs
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        // Native genai providers
        "openai",
        "anthropic",
        "gemini",
        "ollama",
        "groq",
        "xai",
        "deepseek",
        "cohere",
        "fireworks",
        "together",
        // OpenAI-compatible providers via resolver
        "azure",
        "openrouter",
        "mistral",
        "openai_compat",
        // Testing
        "mock",
    ]
}
