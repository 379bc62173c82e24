//! Engine configuration
//!
//! Settings come from layered sources:
//! - `MemoryConfigSource`: In-memory for testing
//! - `EngineConfigFile`: YAML file-based (user/workspace level)
//!
//! Raw settings merge field by field, later sources winning, and then
//! resolve into an [`EngineConfig`]. The round limit has no default.

mod engine;
mod file;
mod memory;
mod traits;

pub use engine::{EngineConfig, RawConfirmationConfig, RawEngineConfig};
pub use file::{ConfigLevel, EngineConfigFile};
pub use memory::MemoryConfigSource;
pub use traits::{ConfigError, ConfigResult, ConfigSource};
