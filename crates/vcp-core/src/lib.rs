//! VCP Core
//!
//! Streaming tool-call protocol engine for LLM completions. Models request
//! tools by writing plain-text blocks into their output:
//!
//! ```text
//! <<<[TOOL_REQUEST]>>>
//! tool_name:「始」GetTime「末」,
//! timezone:「始」UTC「末」
//! <<<[END_TOOL_REQUEST]>>>
//! ```
//!
//! The engine finds these blocks while tokens are still arriving, strips
//! them from the visible text, runs each one at most once and feeds the
//! results back to the model for another round.
//!
//! ## Pipeline
//!
//! - [`detector`]: incremental buffer and the `Idle/Draining/Executing` state machine
//! - [`bridge`]: provider-native tool calls into the same request shape
//! - [`dispatch`]: confirmation, execution and result collection
//! - [`continuation`]: multi-round loop bounded by a required round limit
//! - [`engine`]: the per-turn driver producing a stream of [`TurnEvent`]s
//!
//! ```rust,ignore
//! use vcp_core::engine::TurnEngine;
//!
//! let engine = TurnEngine::builder()
//!     .config(&config)
//!     .executor(executor)
//!     .continuation(continuation.clone())
//!     .logger(logger)
//!     .build()?;
//!
//! let mut events = engine.run(continuation.initial_stream(cancel).await?);
//! while let Some(event) = events.next().await {
//!     // render text, show tool progress, ...
//! }
//! ```

pub mod types;
pub mod logging;
pub mod protocol;
pub mod detector;
pub mod bridge;
pub mod dispatch;
pub mod continuation;
pub mod engine;
pub mod providers;
pub mod executors;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use types::{
    CancellationToken, ChatMessage, MessageRole, NativeToolCall, ProviderEvent, Tool,
    ToolParams, ToolRequest, ToolResult, TurnEvent,
};

pub use logging::{ConsoleLogger, Logger, NoOpLogger};

pub use protocol::{build_protocol_instructions, encode_request, ToolDescriptor};

pub use dispatch::{AutoConfirm, ChannelConfirmer, Confirmer, ToolExecutor};

pub use continuation::{Continuation, ProviderContinuation};

pub use engine::{TurnEngine, TurnEngineBuilder, TurnStream};

pub use providers::{create_provider, Provider, ProviderStream};

pub use config::{EngineConfig, EngineConfigFile};

pub use error::{EngineError, EngineResult};
