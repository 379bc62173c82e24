//! Builder for [`TurnEngine`]

use std::sync::Arc;

use super::turn::TurnEngine;
use crate::bridge::{ProtocolBridge, DEFAULT_PROVIDER_EXECUTED_PREFIX};
use crate::config::{ConfigError, EngineConfig};
use crate::continuation::{Continuation, ContinuationController};
use crate::detector::{Detector, StreamBuffer};
use crate::dispatch::{
    AutoConfirm, ConfirmationPolicy, Confirmer, Dispatcher, ToolExecutor,
    DEFAULT_FIRE_AND_FORGET_PLACEHOLDER,
};
use crate::error::{EngineError, EngineResult};
use crate::logging::{Logger, NoOpLogger};
use crate::types::CancellationToken;

/// Assembles a per-turn engine
///
/// The executor and the round limit are required. Everything else has a
/// default: confirmations are granted automatically, no continuation is
/// configured and logging is discarded.
///
/// ```no_run
/// use std::sync::Arc;
/// use vcp_core::dispatch::{ExecutorError, FnExecutor};
/// use vcp_core::engine::TurnEngine;
/// use vcp_core::types::ToolParams;
///
/// let executor = Arc::new(FnExecutor::new(|name: String, _params: ToolParams| async move {
///     Ok::<_, ExecutorError>(format!("{} ran", name))
/// }));
/// let engine = TurnEngine::builder()
///     .executor(executor)
///     .max_continuation_rounds(4)
///     .build()?;
/// # Ok::<(), vcp_core::error::EngineError>(())
/// ```
pub struct TurnEngineBuilder {
    executor: Option<Arc<dyn ToolExecutor>>,
    confirmer: Option<Arc<dyn Confirmer>>,
    continuation: Option<Arc<dyn Continuation>>,
    max_rounds: Option<usize>,
    policy: ConfirmationPolicy,
    placeholder: String,
    prefixes: Vec<String>,
    logger: Option<Arc<dyn Logger>>,
    cancel: Option<CancellationToken>,
}

impl Default for TurnEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnEngineBuilder {
    pub fn new() -> Self {
        Self {
            executor: None,
            confirmer: None,
            continuation: None,
            max_rounds: None,
            policy: ConfirmationPolicy::default(),
            placeholder: DEFAULT_FIRE_AND_FORGET_PLACEHOLDER.to_string(),
            prefixes: vec![DEFAULT_PROVIDER_EXECUTED_PREFIX.to_string()],
            logger: None,
            cancel: None,
        }
    }

    /// Apply resolved settings
    pub fn config(mut self, config: &EngineConfig) -> Self {
        self.max_rounds = Some(config.max_continuation_rounds);
        self.policy = config.confirmation;
        self.placeholder = config.fire_and_forget_placeholder.clone();
        self.prefixes = config.provider_executed_prefixes.clone();
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn continuation(mut self, continuation: Arc<dyn Continuation>) -> Self {
        self.continuation = Some(continuation);
        self
    }

    pub fn max_continuation_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn confirmation_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn fire_and_forget_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn provider_executed_prefixes(mut self, prefixes: impl IntoIterator<Item = String>) -> Self {
        self.prefixes = prefixes.into_iter().collect();
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Use an existing abort token instead of a fresh one
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> EngineResult<TurnEngine> {
        let executor = self.executor.ok_or(EngineError::MissingComponent("executor"))?;
        let max_rounds = self
            .max_rounds
            .ok_or(ConfigError::MissingField("max_continuation_rounds"))?;

        let logger: Arc<dyn Logger> = self.logger.unwrap_or_else(|| Arc::new(NoOpLogger));
        let confirmer: Arc<dyn Confirmer> = self.confirmer.unwrap_or_else(|| Arc::new(AutoConfirm));

        let dispatcher = Dispatcher::new(executor, confirmer, logger.clone())
            .with_policy(self.policy)
            .with_placeholder(self.placeholder);

        let mut controller = ContinuationController::new(max_rounds, logger.clone());
        if let Some(continuation) = self.continuation {
            controller = controller.with_continuation(continuation);
        }

        Ok(TurnEngine::from_parts(
            Detector::new(StreamBuffer::new(logger.clone())),
            ProtocolBridge::new().with_provider_executed_prefixes(self.prefixes),
            dispatcher,
            controller,
            self.cancel.unwrap_or_default(),
            logger,
        ))
    }
}
