//! Continuation trait and request shape

use async_trait::async_trait;

use crate::providers::{ProviderResult, ProviderStream};
use crate::types::{CancellationToken, ToolResult};

/// Everything the next completion round needs from the round that ended
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationRequest {
    /// Index of the round being started (1 for the first continuation)
    pub round: usize,
    /// Visible assistant text of the round that ended
    pub assistant_text: String,
    /// Results of the confirmed calls, in execution order
    pub results: Vec<ToolResult>,
}

/// Starts a new completion round with tool results fed back to the model
#[async_trait]
pub trait Continuation: Send + Sync {
    async fn continue_turn(
        &self,
        request: ContinuationRequest,
        cancel: CancellationToken,
    ) -> ProviderResult<ProviderStream>;
}
