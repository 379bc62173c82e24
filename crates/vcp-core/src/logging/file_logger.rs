//! File-backed logger
//!
//! Useful when stderr/stdout isn't visible (e.g. an engine embedded in a
//! desktop host). Each logger owns its file handle; there is no global.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

use super::traits::{LogLevel, Logger};

/// Logger that appends formatted lines to a file
pub struct FileLogger {
    path: PathBuf,
    file: Mutex<File>,
    min_level: LogLevel,
}

impl FileLogger {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>, min_level: LogLevel) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            min_level,
        })
    }

    /// Default log location in the system temp directory
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("vcp-engine.log")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the log file
    pub fn clear(&self) -> std::io::Result<()> {
        let mut file = self.file.lock();
        *file = File::create(&self.path)?;
        Ok(())
    }
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs();
            format!(
                "{:02}:{:02}:{:02}.{:03}",
                (secs % 86400) / 3600,
                (secs % 3600) / 60,
                secs % 60,
                d.subsec_millis()
            )
        })
        .unwrap_or_else(|_| "??:??:??.???".to_string())
}

impl Logger for FileLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }
        let mut file = self.file.lock();
        let _ = writeln!(file, "[{}] [{:<5}] {}", timestamp(), level, message);
        let _ = file.flush();
    }
}

impl std::fmt::Debug for FileLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogger")
            .field("path", &self.path)
            .field("min_level", &self.min_level)
            .finish()
    }
}
