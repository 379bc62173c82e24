//! In-memory settings source for testing

use parking_lot::RwLock;

use super::engine::RawEngineConfig;
use super::traits::{ConfigResult, ConfigSource};

#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    name: String,
    config: RwLock<RawEngineConfig>,
}

impl MemoryConfigSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RwLock::new(RawEngineConfig::default()),
        }
    }

    pub fn with_config(name: impl Into<String>, config: RawEngineConfig) -> Self {
        Self {
            name: name.into(),
            config: RwLock::new(config),
        }
    }

    pub fn set(&self, config: RawEngineConfig) {
        *self.config.write() = config;
    }

    pub fn clear(&self) {
        *self.config.write() = RawEngineConfig::default();
    }
}

impl ConfigSource for MemoryConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> ConfigResult<RawEngineConfig> {
        Ok(self.config.read().clone())
    }
}
