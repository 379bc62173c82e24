//! Core types for VCP stream processing
//!
//! This module contains the shared request, result and event types used by
//! every stage of the engine.

mod message;
mod tool;
mod request;
mod result;
mod stream;
mod cancellation;

pub use message::{last_user_message, ChatMessage, MessageRole};
pub use tool::{NativeToolCall, Tool, ToolChoice};
pub use request::{is_fire_and_forget, RawSpan, RequestOrigin, ToolParams, ToolRequest, FIRE_AND_FORGET_KEYS};
pub use result::{ToolOutcome, ToolResult};
pub use stream::{ProviderEvent, TurnEvent};
pub use cancellation::CancellationToken;
