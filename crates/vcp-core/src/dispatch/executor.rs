//! Tool executor abstraction

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{CancellationToken, ToolParams};

/// Errors a tool executor can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The backend cannot be reached
    #[error("Tool executor unavailable: {0}")]
    Unavailable(String),

    /// No tool with that name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The tool ran and reported a failure
    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },

    /// Execution was aborted
    #[error("Tool execution cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Create a failure error
    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executes a named tool with text parameters
///
/// Implementations should watch `cancel` for long-running work; the
/// dispatcher also stops awaiting the call once the turn is aborted.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the tool and return its textual output
    async fn execute(
        &self,
        tool_name: &str,
        params: &ToolParams,
        cancel: CancellationToken,
    ) -> ExecutorResult<String>;
}

/// Executor backed by an async closure
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(String, ToolParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ExecutorResult<String>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(String, ToolParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ExecutorResult<String>> + Send + 'static,
{
    async fn execute(
        &self,
        tool_name: &str,
        params: &ToolParams,
        _cancel: CancellationToken,
    ) -> ExecutorResult<String> {
        (self.f)(tool_name.to_string(), params.clone()).await
    }
}
