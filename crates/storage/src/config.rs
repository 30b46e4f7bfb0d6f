//! Store configuration.
//!
//! The data directory can come from the platform default, the
//! `STICKER_DATA_DIR` environment variable or a JSON file.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "STICKER_DATA_DIR";

/// Configuration for [`crate::FileStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `notes.json` and `settings.json`
    pub data_dir: PathBuf,
    /// Pretty-print written JSON
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_dir: Self::default_data_dir(), pretty: true }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), pretty: true }
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Platform local data directory for the application.
    ///
    /// - Linux: ~/.local/share/sticker
    /// - macOS: ~/Library/Application Support/dev.Sticker.Sticker
    /// - Windows: %LOCALAPPDATA%\Sticker\Sticker\data
    ///
    /// Falls back to a relative `sticker-data` directory when no home
    /// directory can be determined.
    pub fn default_data_dir() -> PathBuf {
        ProjectDirs::from("dev", "Sticker", "Sticker")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("sticker-data"))
    }

    /// Defaults overridden by `STICKER_DATA_DIR`.
    ///
    /// # Errors
    /// Returns an error if the variable is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(DATA_DIR_ENV) {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue(DATA_DIR_ENV.to_owned()));
            }
            config.data_dir = PathBuf::from(value);
        }

        Ok(config)
    }

    /// Loads configuration from a JSON file such as
    ///
    /// ```json
    /// { "data_dir": "/path/to/notes", "pretty": false }
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
