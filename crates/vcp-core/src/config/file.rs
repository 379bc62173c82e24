//! File-based engine settings (YAML)
//!
//! Supports user-level (~/.config/vcp/engine.yaml) and workspace-level
//! (.config/vcp/engine.yaml) files. Workspace settings override user
//! settings field by field.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::engine::{EngineConfig, RawEngineConfig};
use super::traits::{ConfigResult, ConfigSource};

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/vcp/engine.yaml)
    User,
    /// Workspace-level config (.config/vcp/engine.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// Engine settings stored in a YAML file
///
/// # Example
///
/// ```no_run
/// use vcp_core::config::EngineConfigFile;
///
/// let user = EngineConfigFile::user();
/// let workspace = EngineConfigFile::workspace("/path/to/workspace");
/// let config = EngineConfigFile::load_layered(&user, &workspace)?;
/// # Ok::<(), vcp_core::config::ConfigError>(())
/// ```
pub struct EngineConfigFile {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<RawEngineConfig>>,
}

impl EngineConfigFile {
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// User-level file (~/.config/vcp/engine.yaml)
    pub fn user() -> Self {
        // XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        Self::new(config_dir.join("vcp").join("engine.yaml"), ConfigLevel::User)
    }

    /// Workspace-level file (.config/vcp/engine.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("vcp")
            .join("engine.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> ConfigResult<RawEngineConfig> {
        if !self.path.exists() {
            return Ok(RawEngineConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(RawEngineConfig::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Re-read the file, replacing the cached copy
    pub fn reload(&self) -> ConfigResult<RawEngineConfig> {
        let config = self.read()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Resolve user settings overlaid with workspace settings
    pub fn load_layered(
        user: &EngineConfigFile,
        workspace: &EngineConfigFile,
    ) -> ConfigResult<EngineConfig> {
        let sources: [&dyn ConfigSource; 2] = [user, workspace];
        EngineConfig::load_layered(&sources)
    }
}

impl ConfigSource for EngineConfigFile {
    fn name(&self) -> &str {
        self.level.as_str()
    }

    fn load(&self) -> ConfigResult<RawEngineConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }
        self.reload()
    }
}

impl std::fmt::Debug for EngineConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfigFile")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::dispatch::TimeoutAction;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let file = EngineConfigFile::new(dir.path().join("engine.yaml"), ConfigLevel::User);

        assert!(!file.exists());
        assert_eq!(file.load().unwrap(), RawEngineConfig::default());
    }

    #[test]
    fn test_load_is_cached_until_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "max_continuation_rounds: 4\n").unwrap();
        let file = EngineConfigFile::new(&path, ConfigLevel::User);

        assert_eq!(file.load().unwrap().max_continuation_rounds, Some(4));

        fs::write(&path, "max_continuation_rounds: 9\n").unwrap();
        assert_eq!(file.load().unwrap().max_continuation_rounds, Some(4));
        assert_eq!(file.reload().unwrap().max_continuation_rounds, Some(9));
        assert_eq!(file.load().unwrap().max_continuation_rounds, Some(9));
    }

    #[test]
    fn test_workspace_overrides_user() {
        let dir = tempdir().unwrap();
        let user = EngineConfigFile::new(dir.path().join("user.yaml"), ConfigLevel::User);
        fs::write(
            user.path(),
            "max_continuation_rounds: 6\nconfirmation:\n  timeout_secs: 20\n  on_timeout: cancel\n",
        )
        .unwrap();

        let workspace = EngineConfigFile::workspace(dir.path());
        fs::create_dir_all(workspace.path().parent().unwrap()).unwrap();
        fs::write(
            workspace.path(),
            "max_continuation_rounds: 2\nprovider_executed_prefixes: [web_, builtin_]\n",
        )
        .unwrap();

        let config = EngineConfigFile::load_layered(&user, &workspace).unwrap();
        assert_eq!(config.max_continuation_rounds, 2);
        assert_eq!(config.confirmation.timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.confirmation.on_timeout, TimeoutAction::Cancel);
        assert_eq!(config.provider_executed_prefixes, vec!["web_", "builtin_"]);
    }

    #[test]
    fn test_layered_without_round_limit_fails() {
        let dir = tempdir().unwrap();
        let user = EngineConfigFile::new(dir.path().join("a.yaml"), ConfigLevel::User);
        let workspace = EngineConfigFile::new(dir.path().join("b.yaml"), ConfigLevel::Workspace);

        assert!(matches!(
            EngineConfigFile::load_layered(&user, &workspace),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "max_continuation_rounds: [not a number").unwrap();

        let file = EngineConfigFile::new(&path, ConfigLevel::Workspace);
        assert!(matches!(file.load(), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_paths() {
        let workspace = EngineConfigFile::workspace("/tmp/project");
        assert_eq!(
            workspace.path(),
            Path::new("/tmp/project/.config/vcp/engine.yaml")
        );
        assert_eq!(workspace.level(), ConfigLevel::Workspace);
        assert!(EngineConfigFile::user().path().ends_with("vcp/engine.yaml"));
    }
}
