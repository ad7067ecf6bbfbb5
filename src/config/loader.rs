//! Configuration loading and discovery for `beluga.toml`

use super::schema::BelugaConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "beluga.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// One message per invalid field
    #[error("invalid configuration:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub characters: Option<PathBuf>,
    pub sounds: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub fps: Option<u32>,
    pub jobs: Option<usize>,
    pub strict: Option<bool>,
}

/// Find beluga.toml by walking up from the current working directory, then
/// in `$XDG_CONFIG_HOME/beluga/` (or `~/.config/beluga/`).
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from).or_else(find_xdg_config)
}

/// Find beluga.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("beluga").join(CONFIG_FILE);
    config_path.exists().then_some(config_path)
}

/// Find beluga.toml by walking up from `start`.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(CONFIG_FILE)).find(|candidate| candidate.is_file())
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one the file is discovered with
/// [`find_config`]; when none is found the defaults are used and asset paths
/// resolve against the working directory.
pub fn load_config(path: Option<&Path>) -> Result<BelugaConfig, ConfigError> {
    match path.map(Path::to_path_buf).or_else(find_config) {
        Some(found) => load_config_file(&found),
        None => {
            debug!("no {} found, using defaults", CONFIG_FILE);
            Ok(default_config())
        }
    }
}

fn load_config_file(path: &Path) -> Result<BelugaConfig, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let mut config: BelugaConfig = toml::from_str(&contents)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    config.root = project_root(path).map(Path::to_path_buf);
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Configuration used when no beluga.toml exists.
pub fn default_config() -> BelugaConfig {
    BelugaConfig::default()
}

/// Merge CLI overrides into a configuration. CLI values win.
///
/// Overridden paths are taken as given (relative to the working directory),
/// not relative to the config file.
pub fn merge_cli_overrides(config: &mut BelugaConfig, overrides: &CliOverrides) {
    let cwd = env::current_dir().ok().filter(|_| config.root.is_some());
    let absolute = |p: &PathBuf| match &cwd {
        Some(cwd) => resolve_path(cwd, p),
        None => p.clone(),
    };

    if let Some(ref characters) = overrides.characters {
        config.assets.characters = absolute(characters);
    }
    if let Some(ref sounds) = overrides.sounds {
        config.assets.sounds = absolute(sounds);
    }
    if let Some(ref out) = overrides.out {
        config.video.out = absolute(out);
    }
    if let Some(fps) = overrides.fps {
        config.video.fps = fps;
    }
    if let Some(jobs) = overrides.jobs {
        config.video.jobs = Some(jobs);
    }
    if let Some(strict) = overrides.strict {
        config.validate.strict = strict;
    }
}

/// The directory holding a config file
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve `path` against `project_root` unless it is absolute.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
