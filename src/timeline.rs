//! Timeline compilation
//!
//! Assigns every event of a validated script an absolute `[start, end)`
//! window. Events are laid out back to back from zero, and sound effects fire
//! at the start of the event that names them.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::models::{format_seconds, Event, TimedEvent};
use crate::validate::ValidScript;

/// A sound effect placed on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundCue<'a> {
    pub offset: Duration,
    pub sound: &'a str,
    /// Length of the event that triggers the cue; playback is trimmed to it
    pub max_length: Duration,
}

/// Ordered, gap-free sequence of timed events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<TimedEvent>,
}

impl Timeline {
    /// Lay out a validated script.
    ///
    /// # Panics
    ///
    /// Panics if an event has a zero duration or the running offset
    /// overflows. The parser and validator reject both, so reaching one here
    /// is a bug.
    pub fn compile(script: &ValidScript) -> Self {
        let (events, total) = script.script().iter().fold(
            (Vec::with_capacity(script.script().len()), Duration::ZERO),
            |(mut events, cursor), event| {
                let duration = event.duration();
                assert!(
                    !duration.is_zero(),
                    "event on line {} has no duration",
                    event.line()
                );
                let end = cursor + duration;
                events.push(TimedEvent {
                    event: event.clone(),
                    start: cursor,
                    end,
                    sound_trigger: event.sound().map(|_| cursor),
                });
                (events, end)
            },
        );

        debug!(events = events.len(), total = %format_seconds(total), "compiled timeline");
        Self { events }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// End of the last event, or zero for an empty timeline
    pub fn total_duration(&self) -> Duration {
        self.events.last().map_or(Duration::ZERO, |last| last.end)
    }

    /// Sound cues in trigger order
    pub fn sound_cues(&self) -> Vec<SoundCue<'_>> {
        self.events
            .iter()
            .filter_map(|timed| {
                let offset = timed.sound_trigger?;
                let sound = timed.event.sound()?;
                Some(SoundCue { offset, sound, max_length: timed.duration() })
            })
            .collect()
    }

    /// The event on screen at `offset`
    pub fn event_at(&self, offset: Duration) -> Option<&TimedEvent> {
        let idx = self.events.partition_point(|timed| timed.end <= offset);
        self.events.get(idx).filter(|timed| timed.contains(offset))
    }

    /// Serializable summary used by `beluga timeline --json`
    pub fn summary(&self) -> TimelineSummary {
        TimelineSummary {
            total: self.total_duration().as_secs_f64(),
            events: self
                .events
                .iter()
                .map(|timed| EventSummary {
                    line: timed.event.line(),
                    kind: timed.event.kind_name(),
                    character: timed.event.character().to_string(),
                    start: timed.start.as_secs_f64(),
                    end: timed.end.as_secs_f64(),
                    text: match &timed.event {
                        Event::Message(message) => Some(message.text.clone()),
                        Event::Join(_) => None,
                    },
                    sound: timed.event.sound().map(str::to_string),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineSummary {
    pub total: f64,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub line: usize,
    pub kind: &'static str,
    pub character: String,
    pub start: f64,
    pub end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}
