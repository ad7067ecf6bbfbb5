//! Render command implementation

use std::path::Path;
use std::process::ExitCode;

use crate::compositor::Compositor;
use crate::config::CliOverrides;
use crate::models::format_seconds;
use crate::mux::{FrameSequenceMuxer, GifMuxer, Muxer};
use crate::pipeline::compile_script;
use crate::renderer::CardRenderer;

use super::{
    load_registries, load_settings, plural, print_warnings, read_script, report_compile_error,
    EXIT_ERROR, EXIT_SUCCESS,
};

/// Execute the render command
///
/// `explicit_output` means `-o` named the frame directory itself; otherwise
/// frames go to a directory named after the script under `video.out`.
pub fn run_render(
    config: Option<&Path>,
    overrides: &CliOverrides,
    file: &Path,
    explicit_output: bool,
    gif: Option<&Path>,
) -> ExitCode {
    let settings = match load_settings(config, overrides) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let registries = match load_registries(&settings) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let source = match read_script(file) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let compiled = match compile_script(&source, &registries, &settings.validate.rules()) {
        Ok(c) => c,
        Err(e) => return report_compile_error(file, &e),
    };
    print_warnings(file, compiled.warnings.as_slice());

    let video = &settings.video;
    let muxer: Box<dyn Muxer> = match gif {
        Some(path) => Box::new(GifMuxer::new(path, video.fps)),
        None => {
            let dir = if explicit_output {
                settings.out_path()
            } else {
                let stem = file.file_stem().map_or_else(|| "chat".into(), |s| s.to_os_string());
                settings.out_path().join(stem)
            };
            Box::new(FrameSequenceMuxer::new(dir, video.fps))
        }
    };

    let renderer = CardRenderer::new(video.width, video.height);
    let compositor = Compositor::new(video.compositor());
    let stream =
        match compositor.composite(&compiled.timeline, &registries, &renderer, muxer.as_ref()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

    let events = compiled.timeline.len();
    println!(
        "Rendered {} event{} into {} frame{} ({}s at {} fps)",
        events,
        plural(events),
        stream.frame_count,
        plural(stream.frame_count as usize),
        format_seconds(stream.duration),
        video.fps
    );
    for path in &stream.files {
        println!("  {}", path.display());
    }
    ExitCode::from(EXIT_SUCCESS)
}
