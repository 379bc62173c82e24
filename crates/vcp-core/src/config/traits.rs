//! Configuration source trait

use super::engine::RawEngineConfig;

/// A place engine settings can be read from
///
/// Implementations:
/// - `MemoryConfigSource`: In-memory for testing
/// - `EngineConfigFile`: YAML file (user or workspace level)
pub trait ConfigSource: Send + Sync {
    /// Short label used in logs and errors
    fn name(&self) -> &str;

    /// Read the settings this source defines; absent sources yield defaults
    fn load(&self) -> ConfigResult<RawEngineConfig>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
