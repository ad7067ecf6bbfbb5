//! CLI integration tests for the `beluga` binary
//!
//! Each test builds a small project (beluga.toml, characters, avatars and
//! sounds) in a temporary directory and runs the binary inside it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

const SCRIPT: &str = "WELCOME Alex$^2\n\nBob:\nHi __there__ @Alex!$^3#!pop\n";

/// Get the path to the beluga binary
fn beluga_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_beluga"))
}

/// Create a project with two characters, one sound and a small video size.
fn project() -> TempDir {
    let temp = TempDir::new().expect("should create temp dir");
    let root = temp.path();

    fs::write(
        root.join("beluga.toml"),
        "[assets]\ncharacters = \"assets/characters.json\"\nsounds = \"assets/sounds\"\n\n[video]\nwidth = 128\nheight = 72\nfps = 10\njobs = 2\n",
    )
    .expect("should write config");

    let assets = root.join("assets");
    fs::create_dir_all(assets.join("avatars")).expect("should create avatars dir");
    fs::create_dir_all(assets.join("sounds")).expect("should create sounds dir");
    fs::write(
        assets.join("characters.json"),
        r##"{
            "Alex": {"profile_pic": "avatars/alex.png", "role_color": [88, 101, 242]},
            "Bob": {"profile_pic": "avatars/bob.png", "role_color": "#ED4245"}
        }"##,
    )
    .expect("should write characters");
    RgbaImage::from_pixel(16, 16, Rgba([200, 50, 50, 255]))
        .save(assets.join("avatars/alex.png"))
        .expect("should write avatar");
    RgbaImage::from_pixel(16, 16, Rgba([50, 200, 50, 255]))
        .save(assets.join("avatars/bob.png"))
        .expect("should write avatar");
    fs::write(assets.join("sounds/pop.mp3"), b"ID3").expect("should write sound");

    fs::write(root.join("chat.txt"), SCRIPT).expect("should write script");
    temp
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(beluga_binary())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute beluga")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_validate_valid_script() {
    let temp = project();
    let output = run(temp.path(), &["validate", "chat.txt"]);

    assert!(output.status.success(), "validate failed: {}", stderr(&output));
    assert!(stdout(&output).contains("No issues found."));
}

#[test]
fn test_validate_reports_unknown_sound() {
    let temp = project();
    fs::write(temp.path().join("bad.txt"), "Bob:\nkaboom$^3.5#!boom\n").unwrap();

    let output = run(temp.path(), &["validate", "bad.txt"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Line 2: ERROR"), "stderr: {}", err);
    assert!(err.contains("boom"));
}

#[test]
fn test_validate_json() {
    let temp = project();
    fs::write(temp.path().join("bad.txt"), "Bob:\nthis is **loud$^2\n").unwrap();

    let output = run(temp.path(), &["validate", "--json", "chat.txt", "bad.txt"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(json["valid"], false);
    assert_eq!(json["files"][0]["valid"], true);
    let errors = json["files"][1]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["type"], "unbalanced_formatting");
    assert_eq!(errors[0]["line"], 2);
}

#[test]
fn test_validate_parse_error() {
    let temp = project();
    fs::write(temp.path().join("bad.txt"), "Bob:\nno duration here\n").unwrap();

    let output = run(temp.path(), &["validate", "bad.txt"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Line 2: ERROR - missing"));
}

#[test]
fn test_validate_strict_fails_on_warnings() {
    let temp = project();
    fs::write(temp.path().join("slow.txt"), "Bob:\nwaiting$^45\n").unwrap();

    let lenient = run(temp.path(), &["validate", "slow.txt"]);
    assert!(lenient.status.success());
    assert!(stdout(&lenient).contains("Hint: Run with --strict"));

    let strict = run(temp.path(), &["validate", "--strict", "slow.txt"]);
    assert_eq!(strict.status.code(), Some(1));
}

#[test]
fn test_timeline_json() {
    let temp = project();
    let output = run(temp.path(), &["timeline", "--json", "chat.txt"]);
    assert!(output.status.success(), "timeline failed: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
    assert_eq!(json["total"], 5.0);
    assert_eq!(json["events"][1]["start"], 2.0);
    assert_eq!(json["events"][1]["end"], 5.0);
    assert_eq!(json["events"][1]["sound"], "pop");
}

#[test]
fn test_timeline_text() {
    let temp = project();
    let output = run(temp.path(), &["timeline", "chat.txt"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Alex joined"));
    assert!(out.contains("[#!pop]"));
    assert!(out.contains("Total: 5s, 2 events, 1 sound cue"));
}

#[test]
fn test_render_frame_sequence() {
    let temp = project();
    let output = run(temp.path(), &["render", "chat.txt", "-o", "frames"]);
    assert!(output.status.success(), "render failed: {}", stderr(&output));

    let frames = temp.path().join("frames");
    assert!(frames.join("000.png").exists());
    assert!(frames.join("001.png").exists());
    assert_eq!(image::open(frames.join("000.png")).unwrap().width(), 128);

    let list = fs::read_to_string(frames.join("frames.txt")).unwrap();
    assert_eq!(list, "file '000.png'\nduration 2\nfile '001.png'\nduration 3\nfile '001.png'\n");

    let cues: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(frames.join("cues.json")).unwrap()).unwrap();
    assert_eq!(cues["cues"][0]["offset"], 2.0);
    assert_eq!(cues["cues"][0]["max_length"], 3.0);
    assert!(stdout(&output).contains("into 50 frames"));
}

#[test]
fn test_render_default_output_dir() {
    let temp = project();
    let output = run(temp.path(), &["render", "chat.txt"]);
    assert!(output.status.success(), "render failed: {}", stderr(&output));
    assert!(temp.path().join("output/chat/frames.txt").exists());
}

#[test]
fn test_render_gif() {
    let temp = project();
    let output = run(temp.path(), &["render", "chat.txt", "--gif", "chat.gif"]);
    assert!(output.status.success(), "render failed: {}", stderr(&output));
    assert!(temp.path().join("chat.gif").exists());
    assert!(temp.path().join("chat.cues.json").exists());
}

#[test]
fn test_render_refuses_invalid_script() {
    let temp = project();
    fs::write(temp.path().join("bad.txt"), "Carol:\nhello$^1\n").unwrap();

    let output = run(temp.path(), &["render", "bad.txt", "-o", "frames"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown character 'Carol'"));
    assert!(!temp.path().join("frames").exists());
}

#[test]
fn test_fmt_check_and_rewrite() {
    let temp = project();
    let path = temp.path().join("messy.txt");
    fs::write(&path, "# draft\nBob:\n  hi$^1.50\nBob:\nbye$^2\n").unwrap();

    let check = run(temp.path(), &["fmt", "--check", "messy.txt"]);
    assert_eq!(check.status.code(), Some(1));
    assert!(stderr(&check).contains("needs formatting"));

    let rewrite = run(temp.path(), &["fmt", "messy.txt"]);
    assert!(rewrite.status.success());
    assert_eq!(fs::read_to_string(&path).unwrap(), "# draft\nBob:\nhi$^1.5\nbye$^2\n");

    let again = run(temp.path(), &["fmt", "--check", "messy.txt"]);
    assert!(again.status.success());
}

#[test]
fn test_sounds_and_characters() {
    let temp = project();

    let sounds = run(temp.path(), &["sounds"]);
    assert!(sounds.status.success());
    assert!(stdout(&sounds).contains("pop"));

    let characters = run(temp.path(), &["characters", "--json"]);
    assert!(characters.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&characters)).unwrap();
    assert_eq!(json["characters"][0]["name"], "Alex");
    assert_eq!(json["characters"][1]["color"], "#ED4245");
    assert_eq!(json["characters"][1]["avatar_found"], true);
}

#[test]
fn test_missing_characters_file_is_invalid_args() {
    let temp = project();
    let output = run(temp.path(), &["validate", "chat.txt", "--characters", "nope.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("nope.json"));
}

#[test]
fn test_guide() {
    let temp = project();
    let output = run(temp.path(), &["guide"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("WELCOME Name$^duration"));
}
