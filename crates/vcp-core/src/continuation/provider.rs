//! Continuation backed by a [`Provider`]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::format::format_tool_results;
use super::traits::{Continuation, ContinuationRequest};
use crate::log_info;
use crate::logging::Logger;
use crate::providers::{Provider, ProviderModelConfig, ProviderResult, ProviderStream, StreamChatOptions};
use crate::types::{CancellationToken, ChatMessage};

/// Keeps the conversation and re-invokes the provider for each round
///
/// Each continuation appends the round's assistant text and a user message
/// holding the formatted tool results, then streams a new completion.
pub struct ProviderContinuation {
    provider: Arc<dyn Provider>,
    model: ProviderModelConfig,
    options: StreamChatOptions,
    messages: Mutex<Vec<ChatMessage>>,
    logger: Arc<dyn Logger>,
}

impl ProviderContinuation {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: ProviderModelConfig,
        messages: Vec<ChatMessage>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            provider,
            model,
            options: StreamChatOptions::default(),
            messages: Mutex::new(messages),
            logger,
        }
    }

    pub fn with_options(mut self, options: StreamChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Start the first round from the seeded conversation
    pub async fn initial_stream(&self, cancel: CancellationToken) -> ProviderResult<ProviderStream> {
        let messages = self.messages();
        self.provider
            .stream_chat(messages, self.model.clone(), self.options.clone(), cancel)
            .await
    }

    /// Snapshot of the conversation so far
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Continuation for ProviderContinuation {
    async fn continue_turn(
        &self,
        request: ContinuationRequest,
        cancel: CancellationToken,
    ) -> ProviderResult<ProviderStream> {
        log_info!(
            self.logger,
            "[Continuation] Round {} with {} result(s) via {}",
            request.round,
            request.results.len(),
            self.provider.name()
        );

        let messages = {
            let mut messages = self.messages.lock();
            if !request.assistant_text.is_empty() {
                messages.push(ChatMessage::assistant(request.assistant_text));
            }
            messages.push(ChatMessage::user(format_tool_results(&request.results)));
            messages.clone()
        };

        self.provider
            .stream_chat(messages, self.model.clone(), self.options.clone(), cancel)
            .await
    }
}
