//! Data model for chat scripts and timelines
//!
//! A script is parsed into an ordered list of [`Event`]s. Events carry the
//! 1-indexed line they came from so that later stages can point diagnostics
//! back at the source.

use image::Rgb;
use std::path::PathBuf;
use std::time::Duration;

/// A character that can appear in a chat script.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub name: String,
    /// Role color used for the character's name
    pub color: Rgb<u8>,
    /// Profile picture
    pub avatar: PathBuf,
}

/// A named sound effect asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundEffect {
    pub name: String,
    pub asset: PathBuf,
}

/// Kind of text formatting applied by a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Bold,
    Italic,
    BoldItalic,
}

impl FormatKind {
    /// The markup marker that opens and closes this kind of span.
    ///
    /// `BoldItalic` has no marker of its own; it is written as an italic
    /// span directly wrapping a bold one.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            FormatKind::Bold => Some("**"),
            FormatKind::Italic => Some("__"),
            FormatKind::BoldItalic => None,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FormatKind::Bold | FormatKind::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FormatKind::Italic | FormatKind::BoldItalic)
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::Bold => write!(f, "bold"),
            FormatKind::Italic => write!(f, "italic"),
            FormatKind::BoldItalic => write!(f, "bold-italic"),
        }
    }
}

/// A formatted region of a message.
///
/// `start..end` is the byte range of the span content in the raw message
/// text, excluding the markers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpan {
    pub kind: FormatKind,
    pub start: usize,
    pub end: usize,
}

/// Why a formatting marker could not be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Marker opened but never closed
    Unclosed,
    /// Marker closes a span that is not the innermost open one
    Crossing,
}

/// A formatting marker that breaks the nesting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFault {
    pub marker: FormatKind,
    /// Byte offset of the offending marker in the raw text
    pub offset: usize,
    pub kind: FaultKind,
}

/// An `@name` reference inside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// Referenced character name, without the `@`
    pub name: String,
    /// Byte offset of the `@`
    pub start: usize,
    /// Byte offset one past the end of the name
    pub end: usize,
}

/// A character joining the chat.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEvent {
    pub line: usize,
    pub character: String,
    pub duration: Duration,
    pub sound: Option<String>,
}

/// A chat message sent by a character.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub line: usize,
    pub character: String,
    /// Raw message text, markup included
    pub text: String,
    pub spans: Vec<FormatSpan>,
    pub mentions: Vec<Mention>,
    pub faults: Vec<FormatFault>,
    pub duration: Duration,
    pub sound: Option<String>,
}

/// One timed unit of a chat script.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Join(JoinEvent),
    Message(MessageEvent),
}

impl Event {
    /// Source line of the event (1-indexed)
    pub fn line(&self) -> usize {
        match self {
            Event::Join(join) => join.line,
            Event::Message(message) => message.line,
        }
    }

    /// Name of the character the event belongs to
    pub fn character(&self) -> &str {
        match self {
            Event::Join(join) => &join.character,
            Event::Message(message) => &message.character,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Event::Join(join) => join.duration,
            Event::Message(message) => message.duration,
        }
    }

    pub fn sound(&self) -> Option<&str> {
        match self {
            Event::Join(join) => join.sound.as_deref(),
            Event::Message(message) => message.sound.as_deref(),
        }
    }

    /// Short label used in logs and listings
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Join(_) => "join",
            Event::Message(_) => "message",
        }
    }
}

/// An ordered sequence of parsed events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub events: Vec<Event>,
}

impl Script {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Sum of all event durations, `None` if it overflows
    pub fn total_duration(&self) -> Option<Duration> {
        self.events.iter().try_fold(Duration::ZERO, |total, event| total.checked_add(event.duration()))
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// An event placed on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub event: Event,
    pub start: Duration,
    pub end: Duration,
    /// Offset at which the event's sound effect fires
    pub sound_trigger: Option<Duration>,
}

impl TimedEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the event is on screen at `offset`
    pub fn contains(&self, offset: Duration) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Render `d` as decimal seconds the way scripts write them (`2`, `3.5`).
pub fn format_seconds(d: Duration) -> String {
    match d.subsec_nanos() {
        0 => d.as_secs().to_string(),
        nanos => {
            let frac = format!("{:09}", nanos);
            format!("{}.{}", d.as_secs(), frac.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(line: usize, name: &str, secs: f64) -> Event {
        Event::Join(JoinEvent {
            line,
            character: name.to_string(),
            duration: Duration::from_secs_f64(secs),
            sound: None,
        })
    }

    #[test]
    fn test_event_accessors() {
        let event = join(4, "Alex", 2.0);
        assert_eq!(event.line(), 4);
        assert_eq!(event.character(), "Alex");
        assert_eq!(event.duration(), Duration::from_secs(2));
        assert_eq!(event.sound(), None);
        assert_eq!(event.kind_name(), "join");
    }

    #[test]
    fn test_script_total_duration() {
        let script = Script::new(vec![join(1, "A", 2.0), join(2, "B", 0.5)]);
        assert_eq!(script.len(), 2);
        assert_eq!(script.total_duration(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_script_total_duration_overflow() {
        let mut script = Script::new(vec![join(1, "A", 1.0), join(2, "B", 1.0)]);
        if let Event::Join(join) = &mut script.events[1] {
            join.duration = Duration::MAX;
        }
        assert_eq!(script.total_duration(), None);
    }

    #[test]
    fn test_format_kind_flags() {
        assert!(FormatKind::BoldItalic.is_bold());
        assert!(FormatKind::BoldItalic.is_italic());
        assert!(!FormatKind::Bold.is_italic());
        assert_eq!(FormatKind::Italic.marker(), Some("__"));
        assert_eq!(FormatKind::BoldItalic.marker(), None);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_secs(2)), "2");
        assert_eq!(format_seconds(Duration::from_millis(3500)), "3.5");
        assert_eq!(format_seconds(Duration::from_millis(100)), "0.1");
        assert_eq!(format_seconds(Duration::new(1, 123_456_789)), "1.123456789");
    }

    #[test]
    fn test_timed_event_contains() {
        let timed = TimedEvent {
            event: join(1, "A", 2.0),
            start: Duration::from_secs(2),
            end: Duration::from_secs(4),
            sound_trigger: None,
        };
        assert!(timed.contains(Duration::from_secs(2)));
        assert!(timed.contains(Duration::from_millis(3999)));
        assert!(!timed.contains(Duration::from_secs(4)));
        assert_eq!(timed.duration(), Duration::from_secs(2));
    }
}
