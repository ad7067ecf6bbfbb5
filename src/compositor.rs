//! Parallel rendering of a timeline into a media stream
//!
//! Events are rendered on a bounded rayon pool. Results are collected by
//! timeline index, so the frame order handed to the muxer never depends on
//! which worker finishes first.
//!
//! Images are held for whole frames, so audio cues are placed on the same
//! frame grid: a cue starts on the first frame of its event and lasts as
//! long as that event's image is held.

use std::time::Duration;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::TimedEvent;
use crate::mux::{frames_to_duration, AudioCue, HeldFrame, MediaStream, MuxError, Muxer};
use crate::registry::Registries;
use crate::renderer::{RenderError, Renderer};
use crate::timeline::Timeline;

/// Default output frame rate
pub const DEFAULT_FPS: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    pub fps: u32,
    /// Worker threads; `None` uses the available parallelism
    pub jobs: Option<usize>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self { fps: DEFAULT_FPS, jobs: None }
    }
}

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("frames per second must be at least 1")]
    InvalidFps,
    #[error("cannot start render workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("line {line}: character '{name}' is not registered")]
    UnknownCharacter { line: usize, name: String },
    #[error("line {line}: sound effect '{name}' is not registered")]
    UnknownSound { line: usize, name: String },
    #[error("line {line}: {source}")]
    Render {
        line: usize,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Mux(#[from] MuxError),
}

/// Number of video frames an event of `duration` occupies at `fps`.
///
/// Rounded to the nearest frame, never less than one.
pub fn frames_for(duration: Duration, fps: u32) -> u32 {
    let nanos = duration.as_nanos() * u128::from(fps);
    let frames = (nanos + 500_000_000) / 1_000_000_000;
    frames.clamp(1, u128::from(u32::MAX)) as u32
}

pub struct Compositor {
    config: CompositorConfig,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Render every event, resolve the audio cues and hand both to `muxer`.
    ///
    /// The first failure aborts the run; the muxer is only called once all
    /// events rendered.
    pub fn composite(
        &self,
        timeline: &Timeline,
        registries: &Registries,
        renderer: &dyn Renderer,
        muxer: &dyn Muxer,
    ) -> Result<MediaStream, CompositeError> {
        if self.config.fps == 0 {
            return Err(CompositeError::InvalidFps);
        }

        let cues = self.resolve_cues(timeline, registries)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.config.jobs {
            builder = builder.num_threads(jobs.max(1));
        }
        let pool = builder.build()?;
        debug!(workers = pool.current_num_threads(), events = timeline.len(), "rendering");

        let frames: Vec<HeldFrame> = pool.install(|| {
            timeline
                .events()
                .par_iter()
                .enumerate()
                .map(|(index, timed)| self.render_one(index, timed, registries, renderer))
                .collect::<Result<_, _>>()
        })?;

        info!(images = frames.len(), cues = cues.len(), fps = self.config.fps, "rendered timeline");
        Ok(muxer.mux(frames, cues)?)
    }

    fn render_one(
        &self,
        index: usize,
        timed: &TimedEvent,
        registries: &Registries,
        renderer: &dyn Renderer,
    ) -> Result<HeldFrame, CompositeError> {
        let line = timed.event.line();
        let name = timed.event.character();
        let character = registries
            .characters
            .get(name)
            .ok_or_else(|| CompositeError::UnknownCharacter { line, name: name.to_string() })?;

        let image = renderer
            .render(&timed.event, character)
            .map_err(|source| CompositeError::Render { line, source })?;

        Ok(HeldFrame { index, image, frames: frames_for(timed.duration(), self.config.fps) })
    }

    fn resolve_cues(
        &self,
        timeline: &Timeline,
        registries: &Registries,
    ) -> Result<Vec<AudioCue>, CompositeError> {
        let fps = self.config.fps;
        let mut shown = 0u64;
        let mut cues = Vec::new();

        for timed in timeline.events() {
            let frames = u64::from(frames_for(timed.duration(), fps));
            if let Some(name) = timed.event.sound() {
                let sound = registries.sounds.get(name).ok_or_else(|| {
                    CompositeError::UnknownSound { line: timed.event.line(), name: name.to_string() }
                })?;
                cues.push(AudioCue {
                    offset: frames_to_duration(shown, fps),
                    asset: sound.asset.clone(),
                    max_length: frames_to_duration(frames, fps),
                });
            }
            shown += frames;
        }

        Ok(cues)
    }
}
