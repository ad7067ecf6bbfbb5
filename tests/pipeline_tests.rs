//! End-to-end tests through the library API: registries on disk, compile,
//! composite and mux.

use std::fs;
use std::path::Path;
use std::time::Duration;

use beluga::compositor::{Compositor, CompositorConfig};
use beluga::fmt::format_source;
use beluga::mux::FrameSequenceMuxer;
use beluga::parser::parse_script;
use beluga::pipeline::{compile_script, CompileError};
use beluga::registry::Registries;
use beluga::renderer::CardRenderer;
use beluga::validate::{DiagnosticKind, ValidationRules};
use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

const SCRIPT: &str = "\
# Opening scene
WELCOME Alex$^2#!pop

Alex:
hey **everyone**$^0.5
did you see __that__?$^1.3

Bob:
@Alex yes!!$^3#!pop
WELCOME Carol$^3
";

fn write_assets(root: &Path) -> Registries {
    let assets = root.join("assets");
    fs::create_dir_all(assets.join("sounds")).expect("should create sounds dir");
    fs::write(
        assets.join("characters.json"),
        r##"{
            "Alex": {"profile_pic": "alex.png", "role_color": [88, 101, 242]},
            "Bob": {"profile_pic": "bob.png", "role_color": "#ED4245"},
            "Carol": {"profile_pic": "carol.png", "role_color": "rgb(87, 242, 135)"}
        }"##,
    )
    .expect("should write characters");
    for (name, shade) in [("alex", 40u8), ("bob", 120), ("carol", 220)] {
        RgbaImage::from_pixel(12, 12, Rgba([shade, shade, 255 - shade, 255]))
            .save(assets.join(format!("{}.png", name)))
            .expect("should write avatar");
    }
    fs::write(assets.join("sounds/pop.mp3"), b"ID3").expect("should write sound");

    Registries::load(&assets.join("characters.json"), &assets.join("sounds"))
        .expect("registries should load")
}

fn digest_dir(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .expect("should list output dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    entries.sort();
    entries
        .into_iter()
        .map(|path| {
            let bytes = fs::read(&path).expect("should read output file");
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, Sha256::digest(&bytes).to_vec())
        })
        .collect()
}

// ============================================================================
// Compile
// ============================================================================

#[test]
fn test_compile_timing() {
    let temp = TempDir::new().expect("should create temp dir");
    let registries = write_assets(temp.path());

    let compiled = compile_script(SCRIPT, &registries, &ValidationRules::default())
        .expect("script should compile");
    let timeline = &compiled.timeline;

    let starts: Vec<_> = timeline.events().iter().map(|t| t.start).collect();
    assert_eq!(
        starts,
        vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_millis(2500),
            Duration::from_millis(3800),
            Duration::from_millis(6800),
        ]
    );
    assert_eq!(timeline.total_duration(), Duration::from_millis(9800));

    let cues = timeline.sound_cues();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].offset, Duration::ZERO);
    assert_eq!(cues[0].max_length, Duration::from_secs(2));
    assert_eq!(cues[1].offset, Duration::from_millis(3800));

    assert!(compiled.warnings.is_empty());
}

#[test]
fn test_compile_collects_every_error() {
    let temp = TempDir::new().expect("should create temp dir");
    let registries = write_assets(temp.path());
    let source = "Dave:\nhi @Alx$^1#!pow\nWELCOME Erin$^1\n";

    let err = compile_script(source, &registries, &ValidationRules::default()).unwrap_err();
    let CompileError::Invalid(diagnostics) = err else {
        panic!("expected validation errors");
    };
    let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiagnosticKind::UnknownCharacter));
    assert!(kinds.contains(&DiagnosticKind::UnknownMention));
    assert!(kinds.contains(&DiagnosticKind::UnknownSound));
    assert_eq!(diagnostics.on_line(3).count(), 1);
}

#[test]
fn test_formatted_script_compiles_identically() {
    let temp = TempDir::new().expect("should create temp dir");
    let registries = write_assets(temp.path());
    let rules = ValidationRules::default();

    let formatted = format_source(SCRIPT).expect("script should format");
    assert!(formatted.starts_with("# Opening scene\nWELCOME Alex$^2#!pop\n"));

    let original = compile_script(SCRIPT, &registries, &rules).unwrap();
    let reformatted = compile_script(&formatted, &registries, &rules).unwrap();
    let spans = |t: &beluga::timeline::Timeline| {
        t.events()
            .iter()
            .map(|e| (e.start, e.end, e.event.character().to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(spans(&original.timeline), spans(&reformatted.timeline));
    assert_eq!(parse_script(&formatted).unwrap().len(), 5);
}

// ============================================================================
// Composite
// ============================================================================

#[test]
fn test_composite_frame_sequence() {
    let temp = TempDir::new().expect("should create temp dir");
    let registries = write_assets(temp.path());
    let compiled = compile_script(SCRIPT, &registries, &ValidationRules::default()).unwrap();

    let out = temp.path().join("frames");
    let compositor = Compositor::new(CompositorConfig { fps: 10, jobs: Some(3) });
    let stream = compositor
        .composite(
            &compiled.timeline,
            &registries,
            &CardRenderer::new(160, 90),
            &FrameSequenceMuxer::new(&out, 10),
        )
        .expect("composite should succeed");

    // 2s, 0.5s, 1.3s, 3s, 3s at 10 fps
    assert_eq!(stream.frame_count, 20 + 5 + 13 + 30 + 30);
    assert_eq!(stream.duration, Duration::from_millis(9800));
    for index in 0..5 {
        let frame = image::open(out.join(format!("{:03}.png", index))).expect("frame exists");
        assert_eq!((frame.width(), frame.height()), (160, 90));
    }
    assert!(out.join("frames.txt").exists());
    assert!(out.join("cues.json").exists());
}

#[test]
fn test_composite_is_reproducible() {
    let temp = TempDir::new().expect("should create temp dir");
    let registries = write_assets(temp.path());
    let compiled = compile_script(SCRIPT, &registries, &ValidationRules::default()).unwrap();
    let renderer = CardRenderer::new(160, 90);

    let run = |dir: &Path, jobs: usize| {
        Compositor::new(CompositorConfig { fps: 25, jobs: Some(jobs) })
            .composite(&compiled.timeline, &registries, &renderer, &FrameSequenceMuxer::new(dir, 25))
            .expect("composite should succeed");
        digest_dir(dir)
    };

    let serial = run(&temp.path().join("one"), 1);
    let parallel = run(&temp.path().join("four"), 4);
    assert_eq!(serial, parallel);
}
