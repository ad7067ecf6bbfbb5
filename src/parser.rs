//! Line-oriented parser for chat scripts
//!
//! Grammar, one construct per line:
//!
//! ```text
//! # comment
//! WELCOME <name>$^<seconds>[#!<sound>]     join, standalone
//! <name>:                                  header, starts a character block
//! <text>$^<seconds>[#!<sound>]             message, only inside a block
//! ```
//!
//! The current character is threaded through the fold as explicit state, so
//! two compilations never share parsing context.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::models::{Event, JoinEvent, MessageEvent, Script};
use crate::tokenizer::tokenize;

/// Keyword that opens a join line
pub const JOIN_KEYWORD: &str = "WELCOME";
/// Separates message text from its duration
pub const DURATION_MARKER: &str = "$^";
/// Separates the duration from a sound effect name
pub const SOUND_MARKER: &str = "#!";

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("missing duration marker `$^`")]
    MissingDuration,
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
    #[error("duration must be greater than zero, got '{0}'")]
    NonPositiveDuration(String),
    #[error("message appears before any character header")]
    MessageOutsideBlock,
    #[error("character name is empty")]
    EmptyCharacterName,
    #[error("sound effect name after `#!` is empty")]
    EmptySoundName,
    #[error("unexpected text after sound effect name: '{0}'")]
    MalformedSound(String),
    #[error("unrecognized line; expected a join, a `Name:` header or a message")]
    UnrecognizedLine,
}

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
    /// The offending line as written
    pub text: String,
}

impl ParseError {
    fn new(line: usize, kind: ParseErrorKind, text: &str) -> Self {
        Self { line, kind, text: text.to_string() }
    }
}

/// Parser state between lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseState {
    NoContext,
    InCharacterBlock(String),
}

/// Shape of a single non-comment line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Join { character: &'a str, suffix: Suffix },
    Header { character: &'a str },
    Message { text: &'a str, suffix: Suffix },
}

/// The `$^<duration>[#!<sound>]` tail shared by joins and messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Suffix {
    pub duration: Duration,
    pub sound: Option<String>,
}

/// Parse a decimal number of seconds exactly, without going through `f64`.
///
/// Accepts `3`, `3.5`, `.5` and `3.`; anything past nanosecond precision is
/// truncated.
pub fn parse_seconds(s: &str) -> Result<Duration, ParseErrorKind> {
    let s = s.trim();
    if s.starts_with('-') {
        return if parse_seconds(&s[1..]).is_ok() || s[1..].trim() == "0" {
            Err(ParseErrorKind::NonPositiveDuration(s.to_string()))
        } else {
            Err(ParseErrorKind::InvalidDuration(s.to_string()))
        };
    }

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(ParseErrorKind::InvalidDuration(s.to_string()));
    }

    let secs: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| ParseErrorKind::InvalidDuration(s.to_string()))?
    };
    let nanos = frac
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

    let duration = Duration::new(secs, nanos);
    if duration.is_zero() {
        return Err(ParseErrorKind::NonPositiveDuration(s.to_string()));
    }
    Ok(duration)
}

/// Split `line` at its last duration marker and parse the suffix.
///
/// Scanning from the right lets the text keep any characters, including
/// `$`, `^`, `#` and `!`.
fn split_suffix(line: &str) -> Result<(&str, Suffix), ParseErrorKind> {
    let marker = line.rfind(DURATION_MARKER).ok_or(ParseErrorKind::MissingDuration)?;
    let head = &line[..marker];
    let tail = &line[marker + DURATION_MARKER.len()..];

    let (duration_text, sound) = match tail.split_once(SOUND_MARKER) {
        Some((duration_text, sound_text)) => {
            let sound = sound_text.trim();
            if sound.is_empty() {
                return Err(ParseErrorKind::EmptySoundName);
            }
            if let Some((_, extra)) = sound.split_once(char::is_whitespace) {
                return Err(ParseErrorKind::MalformedSound(extra.trim().to_string()));
            }
            (duration_text, Some(sound.to_string()))
        }
        None => (tail, None),
    };

    let duration = parse_seconds(duration_text)?;
    Ok((head, Suffix { duration, sound }))
}

/// The part of a join line after the keyword, if `line` is a join line.
fn join_rest(line: &str) -> Option<&str> {
    line.strip_prefix(JOIN_KEYWORD).filter(|rest| rest.starts_with(char::is_whitespace))
}

/// Classify one trimmed, non-empty, non-comment line.
pub fn lex_line(line: &str) -> Result<Line<'_>, ParseErrorKind> {
    if let Some(rest) = join_rest(line) {
        let (name, suffix) = split_suffix(rest)?;
        let character = name.trim();
        if character.is_empty() {
            return Err(ParseErrorKind::EmptyCharacterName);
        }
        return Ok(Line::Join { character, suffix });
    }

    if !line.contains(DURATION_MARKER) {
        if let Some(name) = line.strip_suffix(':') {
            let character = name.trim();
            if character.is_empty() {
                return Err(ParseErrorKind::EmptyCharacterName);
            }
            return Ok(Line::Header { character });
        }
        return Err(ParseErrorKind::MissingDuration);
    }

    let (text, suffix) = split_suffix(line)?;
    Ok(Line::Message { text: text.trim_end(), suffix })
}

/// Whether a raw line is skipped entirely (blank or `#` comment).
pub fn is_ignored(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Advance the parser by one raw line.
fn step(
    (state, mut events): (ParseState, Vec<Event>),
    (line_number, raw): (usize, &str),
) -> Result<(ParseState, Vec<Event>), ParseError> {
    if is_ignored(raw) {
        return Ok((state, events));
    }
    let line = raw.trim();

    let lexed = match lex_line(line) {
        Ok(lexed) => lexed,
        // A line without `$^` outside any block is not a malformed message,
        // it is simply not part of the grammar.
        Err(ParseErrorKind::MissingDuration)
            if state == ParseState::NoContext && join_rest(line).is_none() =>
        {
            return Err(ParseError::new(line_number, ParseErrorKind::UnrecognizedLine, raw));
        }
        Err(kind) => return Err(ParseError::new(line_number, kind, raw)),
    };

    match lexed {
        Line::Join { character, suffix } => {
            events.push(Event::Join(JoinEvent {
                line: line_number,
                character: character.to_string(),
                duration: suffix.duration,
                sound: suffix.sound,
            }));
            Ok((state, events))
        }
        Line::Header { character } => {
            Ok((ParseState::InCharacterBlock(character.to_string()), events))
        }
        Line::Message { text, suffix } => {
            let ParseState::InCharacterBlock(character) = &state else {
                return Err(ParseError::new(
                    line_number,
                    ParseErrorKind::MessageOutsideBlock,
                    raw,
                ));
            };
            let markup = tokenize(text);
            events.push(Event::Message(MessageEvent {
                line: line_number,
                character: character.clone(),
                text: text.to_string(),
                spans: markup.spans,
                mentions: markup.mentions,
                faults: markup.faults,
                duration: suffix.duration,
                sound: suffix.sound,
            }));
            Ok((state, events))
        }
    }
}

/// Parse a whole script.
///
/// Fails with the first structural fault. Character and sound names are not
/// checked here; that is the validator's job.
///
/// # Examples
///
/// ```
/// use beluga::parser::parse_script;
///
/// let script = parse_script("WELCOME Alex$^2\n\nBob:\nHi __there__!$^3#!pop\n").unwrap();
/// assert_eq!(script.len(), 2);
/// assert_eq!(script.events[1].character(), "Bob");
/// assert_eq!(script.events[1].sound(), Some("pop"));
/// ```
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let (state, events) = source
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .try_fold((ParseState::NoContext, Vec::new()), step)?;

    debug!(events = events.len(), final_state = ?state, "parsed script");
    Ok(Script::new(events))
}
