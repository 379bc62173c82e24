//! Engine settings: raw (layerable) and resolved forms

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult, ConfigSource};
use crate::bridge::DEFAULT_PROVIDER_EXECUTED_PREFIX;
use crate::dispatch::{ConfirmationPolicy, TimeoutAction, DEFAULT_FIRE_AND_FORGET_PLACEHOLDER};

/// Confirmation settings as written in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfirmationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<TimeoutAction>,
}

/// Engine settings as written in a config file, every field optional
///
/// ```yaml
/// max_continuation_rounds: 8
/// confirmation:
///   timeout_secs: 30
///   on_timeout: confirm
/// provider_executed_prefixes: [builtin_]
/// fire_and_forget_placeholder: dispatched
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEngineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_continuation_rounds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<RawConfirmationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_executed_prefixes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fire_and_forget_placeholder: Option<String>,
}

impl RawEngineConfig {
    /// Layer `over` on top of `self`, field by field
    pub fn merge(self, over: RawEngineConfig) -> RawEngineConfig {
        let confirmation = match (self.confirmation, over.confirmation) {
            (Some(base), Some(top)) => Some(RawConfirmationConfig {
                timeout_secs: top.timeout_secs.or(base.timeout_secs),
                on_timeout: top.on_timeout.or(base.on_timeout),
            }),
            (base, top) => top.or(base),
        };

        RawEngineConfig {
            max_continuation_rounds: over.max_continuation_rounds.or(self.max_continuation_rounds),
            confirmation,
            provider_executed_prefixes: over
                .provider_executed_prefixes
                .or(self.provider_executed_prefixes),
            fire_and_forget_placeholder: over
                .fire_and_forget_placeholder
                .or(self.fire_and_forget_placeholder),
        }
    }

    /// Apply defaults and validate
    pub fn resolve(self) -> ConfigResult<EngineConfig> {
        let max_continuation_rounds = self
            .max_continuation_rounds
            .ok_or(ConfigError::MissingField("max_continuation_rounds"))?;

        let raw_confirmation = self.confirmation.unwrap_or_default();
        let timeout = match raw_confirmation.timeout_secs {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "confirmation.timeout_secs",
                    "must be greater than zero",
                ))
            }
            secs => secs.map(Duration::from_secs),
        };

        Ok(EngineConfig {
            max_continuation_rounds,
            confirmation: ConfirmationPolicy {
                timeout,
                on_timeout: raw_confirmation.on_timeout.unwrap_or_default(),
            },
            provider_executed_prefixes: self
                .provider_executed_prefixes
                .unwrap_or_else(|| vec![DEFAULT_PROVIDER_EXECUTED_PREFIX.to_string()]),
            fire_and_forget_placeholder: self
                .fire_and_forget_placeholder
                .unwrap_or_else(|| DEFAULT_FIRE_AND_FORGET_PLACEHOLDER.to_string()),
        })
    }
}

/// Resolved engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Continuation rounds allowed per turn after the initial stream
    pub max_continuation_rounds: usize,
    pub confirmation: ConfirmationPolicy,
    /// Native tool-name prefixes the provider executes itself
    pub provider_executed_prefixes: Vec<String>,
    /// Output reported for fire-and-forget requests
    pub fire_and_forget_placeholder: String,
}

impl EngineConfig {
    /// Settings with defaults for everything but the round limit
    pub fn new(max_continuation_rounds: usize) -> Self {
        Self {
            max_continuation_rounds,
            confirmation: ConfirmationPolicy::default(),
            provider_executed_prefixes: vec![DEFAULT_PROVIDER_EXECUTED_PREFIX.to_string()],
            fire_and_forget_placeholder: DEFAULT_FIRE_AND_FORGET_PLACEHOLDER.to_string(),
        }
    }

    pub fn with_confirmation(mut self, policy: ConfirmationPolicy) -> Self {
        self.confirmation = policy;
        self
    }

    /// Merge sources in order (later wins) and resolve
    pub fn load_layered(sources: &[&dyn ConfigSource]) -> ConfigResult<EngineConfig> {
        let mut merged = RawEngineConfig::default();
        for source in sources {
            merged = merged.merge(source.load()?);
        }
        merged.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_round_limit() {
        let err = RawEngineConfig::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("max_continuation_rounds")));
    }

    #[test]
    fn test_defaults() {
        let config = RawEngineConfig {
            max_continuation_rounds: Some(5),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(config, EngineConfig::new(5));
        assert_eq!(config.provider_executed_prefixes, vec!["builtin_"]);
        assert_eq!(config.confirmation.timeout, None);
    }

    #[test]
    fn test_merge_field_by_field() {
        let user: RawEngineConfig = serde_yaml::from_str(
            "max_continuation_rounds: 10\nconfirmation:\n  timeout_secs: 30\n  on_timeout: cancel\n",
        )
        .unwrap();
        let workspace: RawEngineConfig =
            serde_yaml::from_str("confirmation:\n  timeout_secs: 5\nfire_and_forget_placeholder: queued\n").unwrap();

        let config = user.merge(workspace).resolve().unwrap();
        assert_eq!(config.max_continuation_rounds, 10);
        assert_eq!(config.confirmation.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.confirmation.on_timeout, TimeoutAction::Cancel);
        assert_eq!(config.fire_and_forget_placeholder, "queued");
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let raw: RawEngineConfig =
            serde_yaml::from_str("max_continuation_rounds: 1\nconfirmation:\n  timeout_secs: 0\n").unwrap();
        assert!(matches!(
            raw.resolve(),
            Err(ConfigError::Invalid { field: "confirmation.timeout_secs", .. })
        ));
    }

    #[test]
    fn test_serialization_skips_unset() {
        let raw = RawEngineConfig {
            max_continuation_rounds: Some(3),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&raw).unwrap();
        assert_eq!(yaml.trim(), "max_continuation_rounds: 3");
    }
}
