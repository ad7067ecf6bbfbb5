//! Character and sound registries
//!
//! Registries are loaded once before a script is compiled and are only read
//! afterwards. The parser never touches them; the validator, compositor and
//! CLI receive them by reference.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::color::{ColorError, ColorSpec};
use crate::models::{Character, SoundEffect};

/// Audio file extensions picked up from a sounds directory, in priority order.
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Error raised while loading a registry source.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("character '{name}' has an invalid role color: {source}")]
    Color {
        name: String,
        #[source]
        source: ColorError,
    },
    #[error("sounds directory '{}' does not exist", .0.display())]
    MissingSoundsDir(PathBuf),
    #[error("invalid sounds directory pattern: {0}")]
    Pattern(String),
}

/// One entry of `characters.json`.
#[derive(Debug, Deserialize)]
struct CharacterEntry {
    profile_pic: PathBuf,
    role_color: ColorSpec,
}

/// Registry of characters, keyed by exact (case-sensitive) name.
#[derive(Debug, Clone, Default)]
pub struct CharacterRegistry {
    characters: HashMap<String, Character>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a character, replacing any existing one with the same name.
    pub fn register(&mut self, character: Character) {
        self.characters.insert(character.name.clone(), character);
    }

    pub fn get(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.characters.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Character names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.characters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Load a `characters.json` file.
    ///
    /// Avatar paths are resolved relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path)
            .map_err(|source| RegistryError::Io { path: path.to_path_buf(), source })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Self::from_json_str(&content, base_dir).map_err(|e| match e {
            RegistryError::Parse { message, .. } => {
                RegistryError::Parse { path: path.to_path_buf(), message }
            }
            other => other,
        })
    }

    /// Parse character definitions from JSON5 text.
    pub fn from_json_str(content: &str, base_dir: &Path) -> Result<Self, RegistryError> {
        let entries: BTreeMap<String, CharacterEntry> = json5::from_str(content)
            .map_err(|e| RegistryError::Parse { path: PathBuf::new(), message: e.to_string() })?;

        let mut registry = Self::new();
        for (name, entry) in entries {
            let color = entry
                .role_color
                .resolve()
                .map_err(|source| RegistryError::Color { name: name.clone(), source })?;
            let avatar = base_dir.join(&entry.profile_pic);
            if !avatar.exists() {
                warn!(character = %name, avatar = %avatar.display(), "profile picture not found");
            }
            registry.register(Character { name, color, avatar });
        }

        debug!(count = registry.len(), "loaded character registry");
        Ok(registry)
    }
}

/// Registry of sound effects, kept sorted by name for listings.
#[derive(Debug, Clone, Default)]
pub struct SoundRegistry {
    sounds: BTreeMap<String, SoundEffect>,
}

impl SoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sound, replacing any existing one with the same name.
    pub fn register(&mut self, sound: SoundEffect) {
        self.sounds.insert(sound.name.clone(), sound);
    }

    pub fn get(&self, name: &str) -> Option<&SoundEffect> {
        self.sounds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sounds.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoundEffect> {
        self.sounds.values()
    }

    /// Build a registry from every supported audio file in `dir`.
    ///
    /// The sound name is the file stem. When the same stem exists with
    /// several extensions, the earlier entry of
    /// [`SUPPORTED_AUDIO_EXTENSIONS`] wins.
    pub fn load_dir(dir: &Path) -> Result<Self, RegistryError> {
        if !dir.is_dir() {
            return Err(RegistryError::MissingSoundsDir(dir.to_path_buf()));
        }

        let escaped = glob::Pattern::escape(&dir.display().to_string());
        let mut registry = Self::new();

        for ext in SUPPORTED_AUDIO_EXTENSIONS {
            let pattern = format!("{}/*.{}", escaped, ext);
            let paths = glob(&pattern).map_err(|e| RegistryError::Pattern(e.to_string()))?;
            for path in paths.filter_map(Result::ok) {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if registry.contains(name) {
                    debug!(sound = name, skipped = %path.display(), "duplicate sound stem");
                    continue;
                }
                registry.register(SoundEffect { name: name.to_string(), asset: path.clone() });
            }
        }

        debug!(count = registry.len(), dir = %dir.display(), "loaded sound registry");
        Ok(registry)
    }
}

/// Both registries a compilation run needs.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub characters: CharacterRegistry,
    pub sounds: SoundRegistry,
}

impl Registries {
    pub fn new(characters: CharacterRegistry, sounds: SoundRegistry) -> Self {
        Self { characters, sounds }
    }

    /// Load the character file and scan the sounds directory.
    ///
    /// A missing sounds directory yields an empty sound registry so that
    /// scripts without sound cues still compile.
    pub fn load(characters_file: &Path, sounds_dir: &Path) -> Result<Self, RegistryError> {
        let characters = CharacterRegistry::load(characters_file)?;
        let sounds = match SoundRegistry::load_dir(sounds_dir) {
            Ok(sounds) => sounds,
            Err(RegistryError::MissingSoundsDir(dir)) => {
                warn!(dir = %dir.display(), "sounds directory not found, no sound effects available");
                SoundRegistry::new()
            }
            Err(e) => return Err(e),
        };
        Ok(Self { characters, sounds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    const CHARACTERS: &str = r##"{
        // comments are fine, this is JSON5
        "Alex": {"profile_pic": "alex.png", "role_color": [88, 101, 242]},
        "Bob": {"profile_pic": "avatars/bob.png", "role_color": "#ED4245"},
    }"##;

    #[test]
    fn test_characters_from_json() {
        let registry = CharacterRegistry::from_json_str(CHARACTERS, Path::new("assets")).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Alex", "Bob"]);

        let alex = registry.get("Alex").unwrap();
        assert_eq!(alex.color, Rgb([88, 101, 242]));
        assert_eq!(alex.avatar, PathBuf::from("assets/alex.png"));

        let bob = registry.get("Bob").unwrap();
        assert_eq!(bob.color, Rgb([0xED, 0x42, 0x45]));
        assert_eq!(bob.avatar, PathBuf::from("assets/avatars/bob.png"));
    }

    #[test]
    fn test_characters_are_case_sensitive() {
        let registry = CharacterRegistry::from_json_str(CHARACTERS, Path::new(".")).unwrap();
        assert!(registry.contains("Alex"));
        assert!(!registry.contains("alex"));
    }

    #[test]
    fn test_characters_invalid_color() {
        let content = r##"{"Eve": {"profile_pic": "e.png", "role_color": "#XYZ"}}"##;
        let err = CharacterRegistry::from_json_str(content, Path::new(".")).unwrap_err();
        assert!(matches!(err, RegistryError::Color { ref name, .. } if name == "Eve"));
    }

    #[test]
    fn test_characters_invalid_json() {
        let err = CharacterRegistry::from_json_str("{not json", Path::new(".")).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_characters_load_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("characters.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = CharacterRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("characters.json"));
    }

    #[test]
    fn test_sounds_load_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pop.mp3"), b"").unwrap();
        fs::write(dir.path().join("boom.wav"), b"").unwrap();
        fs::write(dir.path().join("pop.wav"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let registry = SoundRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.names(), vec!["boom", "pop"]);
        assert_eq!(registry.get("pop").unwrap().asset, dir.path().join("pop.mp3"));
        assert!(!registry.contains("notes"));
    }

    #[test]
    fn test_sounds_missing_dir() {
        let dir = tempdir().unwrap();
        let err = SoundRegistry::load_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::MissingSoundsDir(_)));
    }

    #[test]
    fn test_registries_load_tolerates_missing_sounds() {
        let dir = tempdir().unwrap();
        let chars = dir.path().join("characters.json");
        fs::write(&chars, CHARACTERS).unwrap();

        let registries = Registries::load(&chars, &dir.path().join("sounds")).unwrap();
        assert_eq!(registries.characters.len(), 2);
        assert!(registries.sounds.is_empty());
    }
}
