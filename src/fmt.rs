//! Formatter for chat scripts
//!
//! Re-serializes a parsed script in canonical form:
//! - One header per run of messages from the same character
//! - A blank line before every header after the first
//! - Durations written as exact decimal seconds (`2`, `3.5`)
//!
//! [`format_source`] keeps `#` comment lines, trimmed, ahead of the event
//! that followed them. A comment directly under a header moves above it.

use crate::models::{format_seconds, Event, Script};
use crate::parser::{parse_script, ParseError, DURATION_MARKER, JOIN_KEYWORD, SOUND_MARKER};

/// A comment line and its 1-indexed line number
type Comment<'a> = (usize, &'a str);

fn suffix(event: &Event) -> String {
    let mut s = format!("{}{}", DURATION_MARKER, format_seconds(event.duration()));
    if let Some(sound) = event.sound() {
        s.push_str(SOUND_MARKER);
        s.push_str(sound);
    }
    s
}

fn comments(content: &str) -> Vec<Comment<'_>> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| line.starts_with('#'))
        .collect()
}

/// Append every comment before `line` and drop them from `pending`.
fn flush_comments<'a, 'b>(output: &mut String, pending: &mut &'a [Comment<'b>], line: usize) {
    let comments: &'a [Comment<'b>] = *pending;
    let split = comments.partition_point(|(at, _)| *at < line);
    for (_, text) in &comments[..split] {
        output.push_str(text);
        output.push('\n');
    }
    *pending = &comments[split..];
}

fn render(script: &Script, comments: &[Comment<'_>]) -> String {
    let mut output = String::new();
    let mut pending = comments;
    let mut current: Option<&str> = None;

    for event in script {
        match event {
            Event::Join(join) => {
                flush_comments(&mut output, &mut pending, join.line);
                output.push_str(JOIN_KEYWORD);
                output.push(' ');
                output.push_str(&join.character);
                output.push_str(&suffix(event));
                output.push('\n');
            }
            Event::Message(message) => {
                if current != Some(message.character.as_str()) {
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    flush_comments(&mut output, &mut pending, message.line);
                    output.push_str(&message.character);
                    output.push_str(":\n");
                    current = Some(&message.character);
                } else {
                    flush_comments(&mut output, &mut pending, message.line);
                }
                output.push_str(&message.text);
                output.push_str(&suffix(event));
                output.push('\n');
            }
        }
    }
    flush_comments(&mut output, &mut pending, usize::MAX);

    output
}

/// Format a parsed script. The script holds no comments, so none are written.
pub fn format_script(script: &Script) -> String {
    render(script, &[])
}

/// Parse and re-format script source, keeping its comments.
pub fn format_source(content: &str) -> Result<String, ParseError> {
    let script = parse_script(content)?;
    Ok(render(&script, &comments(content)))
}
