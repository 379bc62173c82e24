//! Turn-level errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::providers::ProviderError;

/// Errors that end a turn or prevent an engine from being built
#[derive(Error, Debug)]
pub enum EngineError {
    /// Upstream provider stream failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The next completion round could not be started
    #[error("Continuation failed: {0}")]
    Continuation(#[source] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Builder is missing a required collaborator
    #[error("Missing engine component: {0}")]
    MissingComponent(&'static str),

    #[error("Turn cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::Continuation(ProviderError::Other("quota exhausted".to_string()));
        assert_eq!(err.to_string(), "Continuation failed: quota exhausted");

        let err: EngineError = ConfigError::MissingField("max_continuation_rounds").into();
        assert!(err.to_string().contains("max_continuation_rounds"));

        assert_eq!(
            EngineError::MissingComponent("executor").to_string(),
            "Missing engine component: executor"
        );
    }
}
