//! Informational commands (sounds, characters, guide)

use std::path::Path;
use std::process::ExitCode;

use crate::config::CliOverrides;
use crate::registry::{CharacterRegistry, SoundRegistry, SUPPORTED_AUDIO_EXTENSIONS};

use super::{load_settings, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

const GUIDE: &str = "\
Script formatting

  Character blocks
    Name:
    Message text$^duration

    A header line names the speaker for every message below it, until the
    next header. Durations are in seconds, e.g. $^2 or $^3.5.

  Joins
    WELCOME Name$^duration

    Shows Name joining the chat. Allowed anywhere; does not change the
    current speaker.

  Formatting
    **bold**   __italics__   __**both**__   @mentions

    Markers must be closed in the order they were opened.

  Sound effects
    Message text$^duration#!sound_name
    WELCOME Name$^duration#!sound_name

    The sound plays when the event appears and is cut off when it ends.
    Names match files in the sounds directory without the extension.

  Comments
    Lines starting with # are ignored, as are blank lines.
";

fn print_json(value: &serde_json::Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Execute the sounds command
pub fn run_sounds(config: Option<&Path>, overrides: &CliOverrides, json: bool) -> ExitCode {
    let settings = match load_settings(config, overrides) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let dir = settings.sounds_path();
    let sounds = match SoundRegistry::load_dir(&dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    if json {
        let entries: Vec<_> = sounds
            .iter()
            .map(|s| serde_json::json!({ "name": s.name, "asset": s.asset.display().to_string() }))
            .collect();
        return print_json(&serde_json::json!({ "sounds": entries }));
    }

    if sounds.is_empty() {
        println!(
            "No sound effects in {} (looking for .{} files)",
            dir.display(),
            SUPPORTED_AUDIO_EXTENSIONS.join(", .")
        );
        return ExitCode::from(EXIT_SUCCESS);
    }

    println!("Sound effects in {}:", dir.display());
    for sound in sounds.iter() {
        let file = sound.asset.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
        println!("  {:<24} {}", sound.name, file);
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Execute the characters command
pub fn run_characters(config: Option<&Path>, overrides: &CliOverrides, json: bool) -> ExitCode {
    let settings = match load_settings(config, overrides) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let characters = match CharacterRegistry::load(&settings.characters_path()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let rows: Vec<_> = characters.names().into_iter().filter_map(|n| characters.get(n)).collect();

    if json {
        let entries: Vec<_> = rows
            .iter()
            .map(|c| {
                let [r, g, b] = c.color.0;
                serde_json::json!({
                    "name": c.name,
                    "color": format!("#{:02X}{:02X}{:02X}", r, g, b),
                    "avatar": c.avatar.display().to_string(),
                    "avatar_found": c.avatar.exists(),
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "characters": entries }));
    }

    for c in rows {
        let [r, g, b] = c.color.0;
        let missing = if c.avatar.exists() { "" } else { "  (avatar missing)" };
        println!("  {:<20} #{:02X}{:02X}{:02X}  {}{}", c.name, r, g, b, c.avatar.display(), missing);
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Execute the guide command
pub fn run_guide() -> ExitCode {
    print!("{}", GUIDE);
    ExitCode::from(EXIT_SUCCESS)
}
