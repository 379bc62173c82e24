//! Decides at round end whether the turn continues

use std::sync::Arc;

use super::traits::{Continuation, ContinuationRequest};
use crate::dispatch::SessionState;
use crate::error::{EngineError, EngineResult};
use crate::logging::Logger;
use crate::providers::ProviderStream;
use crate::types::CancellationToken;
use crate::{log_debug, log_info};

/// Outcome of a finished round
pub enum TurnEnd {
    /// The round's text is final
    Final,
    /// Results were pending but every allowed continuation was used
    RoundLimitReached { limit: usize },
    /// Stream of the next round
    Continue(ProviderStream),
}

impl std::fmt::Debug for TurnEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnEnd::Final => f.write_str("Final"),
            TurnEnd::RoundLimitReached { limit } => f
                .debug_struct("RoundLimitReached")
                .field("limit", limit)
                .finish(),
            TurnEnd::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

/// Gates continuation on confirmed calls and a required round limit
pub struct ContinuationController {
    max_rounds: usize,
    continuation: Option<Arc<dyn Continuation>>,
    logger: Arc<dyn Logger>,
}

impl ContinuationController {
    pub fn new(max_rounds: usize, logger: Arc<dyn Logger>) -> Self {
        Self {
            max_rounds,
            continuation: None,
            logger,
        }
    }

    pub fn with_continuation(mut self, continuation: Arc<dyn Continuation>) -> Self {
        self.continuation = Some(continuation);
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    /// Called once per round after the stream ended
    ///
    /// `continuations` is the number of continuation rounds already started
    /// in this turn.
    pub async fn on_turn_end(
        &self,
        session: &SessionState,
        continuations: usize,
        cancel: &CancellationToken,
    ) -> EngineResult<TurnEnd> {
        let continuation = match &self.continuation {
            Some(continuation) if session.has_any_confirmed_call => continuation,
            _ => return Ok(TurnEnd::Final),
        };

        if continuations >= self.max_rounds {
            log_info!(
                self.logger,
                "[Continuation] Round limit {} reached with {} pending result(s)",
                self.max_rounds,
                session.pending_results.len()
            );
            return Ok(TurnEnd::RoundLimitReached {
                limit: self.max_rounds,
            });
        }

        let request = ContinuationRequest {
            round: continuations + 1,
            assistant_text: session.text.clone(),
            results: session.pending_results.clone(),
        };
        log_debug!(
            self.logger,
            "[Continuation] Starting round {} of {}",
            request.round,
            self.max_rounds
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            stream = continuation.continue_turn(request, cancel.clone()) => {
                stream.map(TurnEnd::Continue).map_err(EngineError::Continuation)
            }
        }
    }
}
