//! Mock provider for testing
//!
//! Provides deterministic, scripted responses without network dependencies.
//! Each call to `stream_chat` plays the next scripted [`MockRound`]; once the
//! script runs out the provider falls back to its [`MockMode`].

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::traits::{Provider, ProviderModelConfig, ProviderStream, StreamChatOptions};
use crate::logging::Logger;
use crate::types::{last_user_message, CancellationToken, ChatMessage, NativeToolCall, ProviderEvent};

/// One step of a scripted round
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Yield a provider event
    Event(ProviderEvent),
    /// Fail the stream with this message
    Error(String),
}

/// Scripted output of one completion round
#[derive(Debug, Clone, Default)]
pub struct MockRound {
    steps: Vec<MockStep>,
}

impl MockRound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text delta
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(MockStep::Event(ProviderEvent::text(text)));
        self
    }

    /// Append `text` split into deltas of `size` characters
    pub fn text_in_chunks(mut self, text: &str, size: usize) -> Self {
        for chunk in split_into_chunks(text, size) {
            self.steps.push(MockStep::Event(ProviderEvent::text(chunk)));
        }
        self
    }

    /// Append a native tool call
    pub fn tool_call(mut self, id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        self.steps.push(MockStep::Event(ProviderEvent::tool_call(NativeToolCall::new(
            id, name, arguments,
        ))));
        self
    }

    /// Append an arbitrary provider event
    pub fn event(mut self, event: ProviderEvent) -> Self {
        self.steps.push(MockStep::Event(event));
        self
    }

    /// Fail the stream at this point
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.steps.push(MockStep::Error(message.into()));
        self
    }

    pub fn steps(&self) -> &[MockStep] {
        &self.steps
    }
}

/// Fallback response mode once the script is exhausted
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user message
    #[default]
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Return nothing (empty response)
    Empty,
}

/// Configuration for the mock provider
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Fallback mode
    pub mode: MockMode,
    /// Delay between events in milliseconds (0 = no delay)
    pub chunk_delay_ms: u64,
    /// Size of each chunk when splitting fallback responses
    pub chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Echo,
            chunk_delay_ms: 0,
            chunk_size: 10,
        }
    }
}

/// Mock LLM provider for testing
pub struct MockProvider {
    config: MockConfig,
    script: Mutex<VecDeque<MockRound>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    logger: Arc<dyn Logger>,
}

impl MockProvider {
    /// Create a new mock provider with default config
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(MockConfig::default(), logger)
    }

    /// Create with specific config
    pub fn with_config(config: MockConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Create an echo provider (echoes back user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::new(logger)
    }

    /// Create a fixed response provider
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Fixed(response.into()),
                ..Default::default()
            },
            logger,
        )
    }

    /// Create a provider that plays `rounds` in order, then returns nothing
    pub fn scripted(rounds: impl IntoIterator<Item = MockRound>, logger: Arc<dyn Logger>) -> Self {
        let provider = Self::with_config(
            MockConfig {
                mode: MockMode::Empty,
                ..Default::default()
            },
            logger,
        );
        provider.script.lock().extend(rounds);
        provider
    }

    /// Queue another scripted round
    pub fn push_round(&self, round: MockRound) {
        self.script.lock().push_back(round);
    }

    /// Set delay between events
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.config.chunk_delay_ms = delay_ms;
        self
    }

    /// Set chunk size for splitting fallback responses
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Conversations received so far, one entry per `stream_chat` call
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }

    pub fn remaining_rounds(&self) -> usize {
        self.script.lock().len()
    }

    fn fallback_round(&self, messages: &[ChatMessage]) -> MockRound {
        let size = self.config.chunk_size;
        match &self.config.mode {
            MockMode::Echo => {
                let user_msg = last_user_message(messages).unwrap_or("Hello from MockProvider!");
                self.logger.debug(&format!("MockProvider: Echo mode, echoing: {}", user_msg));
                MockRound::new().text_in_chunks(&format!("Echo: {}", user_msg), size)
            }
            MockMode::Fixed(response) => {
                self.logger.debug(&format!(
                    "MockProvider: Fixed mode, response len: {}",
                    response.len()
                ));
                MockRound::new().text_in_chunks(response, size)
            }
            MockMode::Empty => {
                self.logger.debug("MockProvider: Empty mode");
                MockRound::new()
            }
        }
    }
}

/// Split text into chunks of `size` characters
fn split_into_chunks(text: &str, size: usize) -> Vec<String> {
    if size == 0 || text.is_empty() {
        return vec![text.to_string()];
    }

    text.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|c| c.iter().collect())
        .collect()
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        _model: ProviderModelConfig,
        _options: StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<ProviderStream> {
        self.logger.debug("MockProvider: stream_chat called");

        let scripted = self.script.lock().pop_front();
        let round = match scripted {
            Some(round) => round,
            None => self.fallback_round(&messages),
        };
        self.requests.lock().push(messages);

        let delay_ms = self.config.chunk_delay_ms;
        let logger = self.logger.clone();

        let stream = stream::iter(round.steps.into_iter().enumerate()).then(move |(i, step)| {
            let logger = logger.clone();
            let cancel = cancel_token.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }

                // Apply delay (except for first event)
                if i > 0 && delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }

                match step {
                    MockStep::Event(event) => {
                        logger.debug(&format!("MockProvider: Yielding event {}: {:?}", i, event));
                        Ok(event)
                    }
                    MockStep::Error(message) => Err(ProviderError::Other(format!("Mock error: {}", message))),
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
