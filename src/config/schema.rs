//! Configuration schema types for `beluga.toml`
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compositor::{CompositorConfig, DEFAULT_FPS};
use crate::validate::ValidationRules;

/// Asset locations, relative to the directory holding `beluga.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Character definitions (JSON5)
    #[serde(default = "default_characters")]
    pub characters: PathBuf,
    /// Directory scanned for `.mp3` / `.wav` sound effects
    #[serde(default = "default_sounds")]
    pub sounds: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self { characters: default_characters(), sounds: default_sounds() }
    }
}

fn default_characters() -> PathBuf {
    PathBuf::from("assets/characters.json")
}

fn default_sounds() -> PathBuf {
    PathBuf::from("assets/sounds/mp3")
}

/// Rendering and output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Render workers; unset uses every core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    /// Directory for rendered output
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            jobs: None,
            out: default_out(),
        }
    }
}

impl VideoConfig {
    pub fn compositor(&self) -> CompositorConfig {
        CompositorConfig { fps: self.fps, jobs: self.jobs }
    }
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_out() -> PathBuf {
    PathBuf::from("output")
}

/// Limits for warning-level script checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Treat warnings as errors
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Seconds
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,
    /// Seconds
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_line_length: default_max_line_length(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
        }
    }
}

impl ValidateConfig {
    /// Rules for the validator. Call only on a validated config; invalid
    /// durations fall back to the defaults.
    pub fn rules(&self) -> ValidationRules {
        let defaults = ValidationRules::default();
        ValidationRules {
            max_line_length: self.max_line_length,
            min_duration: Duration::try_from_secs_f64(self.min_duration)
                .unwrap_or(defaults.min_duration),
            max_duration: Duration::try_from_secs_f64(self.max_duration)
                .unwrap_or(defaults.max_duration),
            strict: self.strict,
        }
    }
}

fn default_max_line_length() -> usize {
    200
}

fn default_min_duration() -> f64 {
    0.1
}

fn default_max_duration() -> f64 {
    30.0
}

/// Root of `beluga.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BelugaConfig {
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub validate: ValidateConfig,
    /// Directory the config was loaded from; relative paths resolve against it
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "video.fps")
    pub field: String,
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: &str, message: &str) -> Self {
        Self { field: field.to_string(), message: message.to_string() }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "beluga.toml: '{}' {}", self.field, self.message)
    }
}

impl BelugaConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.video.fps == 0 {
            errors.push(ConfigValidationError::new("video.fps", "must be a positive integer"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            errors.push(ConfigValidationError::new("video.width/height", "dimensions must be positive"));
        }
        if self.video.jobs == Some(0) {
            errors.push(ConfigValidationError::new("video.jobs", "must be at least 1"));
        }

        let v = &self.validate;
        if v.max_line_length == 0 {
            errors.push(ConfigValidationError::new("validate.max_line_length", "must be a positive integer"));
        }
        if !(v.min_duration.is_finite() && v.min_duration >= 0.0) {
            errors.push(ConfigValidationError::new("validate.min_duration", "must be a non-negative number"));
        }
        if !(v.max_duration.is_finite() && v.max_duration > 0.0) {
            errors.push(ConfigValidationError::new("validate.max_duration", "must be a positive number"));
        } else if v.max_duration < v.min_duration {
            errors.push(ConfigValidationError::new(
                "validate.max_duration",
                "must not be less than validate.min_duration",
            ));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => super::loader::resolve_path(root, path),
            None => path.to_path_buf(),
        }
    }

    pub fn characters_path(&self) -> PathBuf {
        self.resolve(&self.assets.characters)
    }

    pub fn sounds_path(&self) -> PathBuf {
        self.resolve(&self.assets.sounds)
    }

    pub fn out_path(&self) -> PathBuf {
        self.resolve(&self.video.out)
    }
}
