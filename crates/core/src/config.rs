//! Note geometry configuration.
//!
//! The defaults match the rendered note card. Hosts with a different card
//! size can override them programmatically, from environment variables or
//! from a JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub const NOTE_WIDTH_ENV: &str = "STICKER_NOTE_WIDTH";
pub const NOTE_MARGIN_ENV: &str = "STICKER_NOTE_MARGIN";
pub const VIEWPORT_PADDING_ENV: &str = "STICKER_VIEWPORT_PADDING";
pub const MIN_NOTE_HEIGHT_ENV: &str = "STICKER_MIN_NOTE_HEIGHT";
pub const ASSUMED_NOTE_HEIGHT_ENV: &str = "STICKER_ASSUMED_NOTE_HEIGHT";

/// Geometry constants used by [`crate::place`].
///
/// All values are CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Rendered note width
    pub note_width: f64,
    /// Gap between the anchor and the note
    pub note_margin: f64,
    /// Minimum distance kept from the viewport edges
    pub viewport_padding: f64,
    /// Space required below the anchor to place the note there
    pub min_note_height: f64,
    /// Height assumed for the bottom overflow guard
    pub assumed_note_height: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            note_width: 280.0,
            note_margin: 12.0,
            viewport_padding: 16.0,
            min_note_height: 150.0,
            assumed_note_height: 200.0,
        }
    }
}

impl PlacementConfig {
    pub fn with_note_width(mut self, width: f64) -> Self {
        self.note_width = width;
        self
    }

    pub fn with_note_margin(mut self, margin: f64) -> Self {
        self.note_margin = margin;
        self
    }

    pub fn with_viewport_padding(mut self, padding: f64) -> Self {
        self.viewport_padding = padding;
        self
    }

    pub fn with_min_note_height(mut self, height: f64) -> Self {
        self.min_note_height = height;
        self
    }

    pub fn with_assumed_note_height(mut self, height: f64) -> Self {
        self.assumed_note_height = height;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STICKER_NOTE_WIDTH` (default: 280)
    /// - `STICKER_NOTE_MARGIN` (default: 12)
    /// - `STICKER_VIEWPORT_PADDING` (default: 16)
    /// - `STICKER_MIN_NOTE_HEIGHT` (default: 150)
    /// - `STICKER_ASSUMED_NOTE_HEIGHT` (default: 200)
    ///
    /// # Errors
    /// Returns an error if a variable is not a finite, non-negative number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, field) in [
            (NOTE_WIDTH_ENV, &mut config.note_width),
            (NOTE_MARGIN_ENV, &mut config.note_margin),
            (VIEWPORT_PADDING_ENV, &mut config.viewport_padding),
            (MIN_NOTE_HEIGHT_ENV, &mut config.min_note_height),
            (ASSUMED_NOTE_HEIGHT_ENV, &mut config.assumed_note_height),
        ] {
            if let Ok(value) = std::env::var(key) {
                *field = parse_length(key, &value)?;
            }
        }

        Ok(config)
    }

    /// Loads configuration from a JSON file. Missing keys keep their
    /// defaults:
    ///
    /// ```json
    /// { "note_width": 320, "viewport_padding": 8 }
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every length is finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("note_width", self.note_width),
            ("note_margin", self.note_margin),
            ("viewport_padding", self.viewport_padding),
            ("min_note_height", self.min_note_height),
            ("assumed_note_height", self.assumed_note_height),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue(key.to_owned()));
            }
        }
        Ok(())
    }
}

fn parse_length(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|length| length.is_finite() && *length >= 0.0)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_owned()))
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_KEYS: [&str; 5] = [
        NOTE_WIDTH_ENV,
        NOTE_MARGIN_ENV,
        VIEWPORT_PADDING_ENV,
        MIN_NOTE_HEIGHT_ENV,
        ASSUMED_NOTE_HEIGHT_ENV,
    ];

    /// Clears the placement variables and restores them on drop
    struct EnvGuard {
        previous: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            let previous = ALL_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();
            for key in ALL_KEYS {
                env::remove_var(key);
            }
            Self { previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.previous {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = PlacementConfig::default();
        assert_eq!(config.note_width, 280.0);
        assert_eq!(config.note_margin, 12.0);
        assert_eq!(config.viewport_padding, 16.0);
        assert_eq!(config.min_note_height, 150.0);
        assert_eq!(config.assumed_note_height, 200.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PlacementConfig::default()
            .with_note_width(320.0)
            .with_note_margin(8.0)
            .with_viewport_padding(4.0)
            .with_min_note_height(100.0)
            .with_assumed_note_height(240.0);

        assert_eq!(config.note_width, 320.0);
        assert_eq!(config.note_margin, 8.0);
        assert_eq!(config.viewport_padding, 4.0);
        assert_eq!(config.min_note_height, 100.0);
        assert_eq!(config.assumed_note_height, 240.0);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new();
        env::set_var(NOTE_WIDTH_ENV, "300");
        env::set_var(VIEWPORT_PADDING_ENV, " 10.5 ");

        let config = PlacementConfig::from_env().expect("config from env");
        assert_eq!(config.note_width, 300.0);
        assert_eq!(config.viewport_padding, 10.5);
        assert_eq!(config.note_margin, 12.0);
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables_is_default() {
        let _guard = EnvGuard::new();
        assert_eq!(PlacementConfig::from_env().expect("config"), PlacementConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new();

        for bad in ["wide", "-1", "NaN", "inf"] {
            env::set_var(MIN_NOTE_HEIGHT_ENV, bad);
            match PlacementConfig::from_env() {
                Err(ConfigError::InvalidValue(key)) => assert_eq!(key, MIN_NOTE_HEIGHT_ENV),
                other => panic!("expected invalid value for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_json_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("placement.json");
        fs::write(&path, r#"{ "note_width": 320, "viewport_padding": 8 }"#).expect("write");

        let config = PlacementConfig::from_json_file(&path).expect("parse config");
        assert_eq!(
            config,
            PlacementConfig::default().with_note_width(320.0).with_viewport_padding(8.0)
        );
    }

    #[test]
    fn test_from_json_file_rejects_negative_lengths() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("placement.json");
        fs::write(&path, r#"{ "note_margin": -4 }"#).expect("write");

        assert!(matches!(
            PlacementConfig::from_json_file(&path),
            Err(ConfigError::InvalidValue(key)) if key == "note_margin"
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let result = PlacementConfig::from_json_file(temp.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
