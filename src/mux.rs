//! Muxers: turn rendered frames and audio cues into output files
//!
//! A [`Muxer`] receives every rendered image in timeline order, each tagged
//! with how many video frames it stays on screen, plus the audio cues. The
//! two bundled muxers stop short of video encoding:
//!
//! - [`FrameSequenceMuxer`] writes numbered PNGs, an ffmpeg concat list and a
//!   cue sheet, ready for `ffmpeg -f concat -i frames.txt`.
//! - [`GifMuxer`] writes an animated GIF and a sidecar cue sheet.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbaImage;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::gif::render_gif;
use crate::output::{save_png, write_text, OutputError};
use crate::registry::SUPPORTED_AUDIO_EXTENSIONS;

/// A rendered image held on screen for a whole number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldFrame {
    /// Position of the source event in the timeline
    pub index: usize,
    pub image: RgbaImage,
    pub frames: u32,
}

impl HeldFrame {
    /// Time on screen at `fps` frames per second
    pub fn hold(&self, fps: u32) -> Duration {
        frames_to_duration(u64::from(self.frames), fps)
    }
}

/// A sound effect to mix in at `offset`, trimmed to `max_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCue {
    pub offset: Duration,
    pub asset: PathBuf,
    pub max_length: Duration,
}

/// Description of what a muxer produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaStream {
    pub files: Vec<PathBuf>,
    pub duration: Duration,
    pub frame_count: u64,
}

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("audio cue at {offset:?} refers to missing or unsupported asset '{}'", asset.display())]
    UnresolvedAudio { offset: Duration, asset: PathBuf },
    #[error("frames per second must be at least 1")]
    InvalidFps,
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("cannot encode cue sheet: {0}")]
    Json(#[from] serde_json::Error),
}

/// Consumes the compositor's output.
pub trait Muxer {
    fn mux(&self, frames: Vec<HeldFrame>, cues: Vec<AudioCue>) -> Result<MediaStream, MuxError>;
}

/// Play time of `frames` video frames at `fps`.
pub fn frames_to_duration(frames: u64, fps: u32) -> Duration {
    let fps = u64::from(fps.max(1));
    Duration::new(frames / fps, ((frames % fps) * 1_000_000_000 / fps) as u32)
}

fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_AUDIO_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Check that every cue points at an existing, supported audio file.
pub fn check_cues(cues: &[AudioCue]) -> Result<(), MuxError> {
    match cues.iter().find(|cue| !cue.asset.is_file() || !is_supported_audio(&cue.asset)) {
        Some(cue) => {
            Err(MuxError::UnresolvedAudio { offset: cue.offset, asset: cue.asset.clone() })
        }
        None => Ok(()),
    }
}

/// Write the cue sheet as JSON.
fn write_cue_sheet(path: &Path, cues: &[AudioCue]) -> Result<(), MuxError> {
    let entries: Vec<_> = cues
        .iter()
        .map(|cue| {
            json!({
                "offset": cue.offset.as_secs_f64(),
                "asset": cue.asset.display().to_string(),
                "max_length": cue.max_length.as_secs_f64(),
            })
        })
        .collect();
    let mut content = serde_json::to_string_pretty(&json!({ "cues": entries }))?;
    content.push('\n');
    write_text(path, &content)?;
    Ok(())
}

fn stream_totals(frames: &[HeldFrame], fps: u32) -> (Duration, u64) {
    let count: u64 = frames.iter().map(|f| u64::from(f.frames)).sum();
    (frames_to_duration(count, fps), count)
}

/// Writes `NNN.png` per held frame, `frames.txt` and `cues.json` into a directory.
#[derive(Debug, Clone)]
pub struct FrameSequenceMuxer {
    pub dir: PathBuf,
    pub fps: u32,
}

impl FrameSequenceMuxer {
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self { dir: dir.into(), fps }
    }

    /// ffmpeg concat demuxer script. The last file is listed twice since the
    /// demuxer ignores the final `duration` directive.
    fn concat_list(&self, names: &[String], frames: &[HeldFrame]) -> String {
        let mut list = String::new();
        for (name, frame) in names.iter().zip(frames) {
            list.push_str(&format!("file '{}'\n", name));
            list.push_str(&format!("duration {}\n", frame.hold(self.fps).as_secs_f64()));
        }
        if let Some(last) = names.last() {
            list.push_str(&format!("file '{}'\n", last));
        }
        list
    }
}

impl Muxer for FrameSequenceMuxer {
    fn mux(&self, frames: Vec<HeldFrame>, cues: Vec<AudioCue>) -> Result<MediaStream, MuxError> {
        if self.fps == 0 {
            return Err(MuxError::InvalidFps);
        }
        check_cues(&cues)?;

        let width = frames.len().saturating_sub(1).to_string().len().max(3);
        let mut files = Vec::with_capacity(frames.len() + 2);
        let mut names = Vec::with_capacity(frames.len());

        for frame in &frames {
            let name = format!("{:0width$}.png", frame.index, width = width);
            let path = self.dir.join(&name);
            save_png(&frame.image, &path)?;
            debug!(file = %path.display(), frames = frame.frames, "wrote frame");
            files.push(path);
            names.push(name);
        }

        let list_path = self.dir.join("frames.txt");
        write_text(&list_path, &self.concat_list(&names, &frames))?;
        files.push(list_path);

        let cue_path = self.dir.join("cues.json");
        write_cue_sheet(&cue_path, &cues)?;
        files.push(cue_path);

        let (duration, frame_count) = stream_totals(&frames, self.fps);
        info!(dir = %self.dir.display(), images = frames.len(), frame_count, "wrote frame sequence");
        Ok(MediaStream { files, duration, frame_count })
    }
}

/// Writes an animated GIF plus a `<stem>.cues.json` sidecar.
#[derive(Debug, Clone)]
pub struct GifMuxer {
    pub path: PathBuf,
    pub fps: u32,
    pub loop_anim: bool,
}

impl GifMuxer {
    pub fn new(path: impl Into<PathBuf>, fps: u32) -> Self {
        Self { path: path.into(), fps, loop_anim: false }
    }

    pub fn looping(mut self, loop_anim: bool) -> Self {
        self.loop_anim = loop_anim;
        self
    }

    fn cue_sheet_path(&self) -> PathBuf {
        let stem = self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("chat");
        self.path.with_file_name(format!("{}.cues.json", stem))
    }
}

impl Muxer for GifMuxer {
    fn mux(&self, frames: Vec<HeldFrame>, cues: Vec<AudioCue>) -> Result<MediaStream, MuxError> {
        if self.fps == 0 {
            return Err(MuxError::InvalidFps);
        }
        check_cues(&cues)?;

        let held: Vec<_> = frames.iter().map(|f| (&f.image, f.hold(self.fps))).collect();
        render_gif(&held, self.loop_anim, &self.path)?;

        let cue_path = self.cue_sheet_path();
        write_cue_sheet(&cue_path, &cues)?;

        let (duration, frame_count) = stream_totals(&frames, self.fps);
        info!(path = %self.path.display(), images = frames.len(), "wrote gif");
        Ok(MediaStream { files: vec![self.path.clone(), cue_path], duration, frame_count })
    }
}
