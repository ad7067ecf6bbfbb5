//! Markup tokenizer for message text
//!
//! Message text may contain `**bold**`, `__italic__` (nesting in either
//! order) and `@Name` mentions. Markers are matched with an explicit stack of
//! open markers so that every fault has a precise byte offset.

use crate::models::{FaultKind, FormatFault, FormatKind, FormatSpan, Mention};

const MARKER_LEN: usize = 2;

/// Result of tokenizing one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Markup {
    /// Matched spans ordered by start offset
    pub spans: Vec<FormatSpan>,
    pub mentions: Vec<Mention>,
    /// Unmatched or crossing markers ordered by offset
    pub faults: Vec<FormatFault>,
}

/// A styled run of display text with the markers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub mention: bool,
}

#[derive(Debug)]
struct OpenMarker {
    kind: FormatKind,
    offset: usize,
}

/// Spans before bold/italic pairs are merged
#[derive(Debug, Default)]
struct Scan {
    spans: Vec<FormatSpan>,
    mentions: Vec<Mention>,
    faults: Vec<FormatFault>,
}

fn marker_at(bytes: &[u8], i: usize) -> Option<FormatKind> {
    match bytes.get(i..i + MARKER_LEN) {
        Some(b"**") => Some(FormatKind::Bold),
        Some(b"__") => Some(FormatKind::Italic),
        _ => None,
    }
}

/// Byte offset one past the identifier starting at `start`.
///
/// Identifiers are alphanumerics and underscores, but a `__` pair ends the
/// run since it is the italic marker.
fn identifier_end(text: &str, start: usize) -> usize {
    let rest = &text[start..];
    let mut end = start;
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let continues = if c == '_' {
            !matches!(chars.peek(), Some((_, '_')))
        } else {
            c.is_alphanumeric()
        };
        if !continues {
            break;
        }
        end = start + idx + c.len_utf8();
    }
    end
}

fn scan(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut stack: Vec<OpenMarker> = Vec::new();
    let mut out = Scan::default();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(kind) = marker_at(bytes, i) {
            match stack.iter().rposition(|open| open.kind == kind) {
                Some(pos) if pos + 1 == stack.len() => {
                    let start = stack[pos].offset + MARKER_LEN;
                    stack.truncate(pos);
                    out.spans.push(FormatSpan { kind, start, end: i });
                }
                Some(_) => out.faults.push(FormatFault {
                    marker: kind,
                    offset: i,
                    kind: FaultKind::Crossing,
                }),
                None => stack.push(OpenMarker { kind, offset: i }),
            }
            i += MARKER_LEN;
            continue;
        }

        if bytes[i] == b'@' {
            let end = identifier_end(text, i + 1);
            if end > i + 1 {
                out.mentions.push(Mention { name: text[i + 1..end].to_string(), start: i, end });
                i = end;
                continue;
            }
        }

        // Advance by a whole character so offsets stay on char boundaries
        i += text[i..].chars().next().map_or(1, char::len_utf8);
    }

    out.faults.extend(stack.into_iter().map(|open| FormatFault {
        marker: open.kind,
        offset: open.offset,
        kind: FaultKind::Unclosed,
    }));
    out.faults.sort_by_key(|fault| fault.offset);
    out
}

/// Collapse an italic span directly wrapping a bold one (or the reverse)
/// into a single bold-italic span over the inner content.
fn merge_bold_italic(spans: &[FormatSpan]) -> Vec<FormatSpan> {
    let mut absorbed = vec![false; spans.len()];
    let mut merged = Vec::with_capacity(spans.len());

    for (i, inner) in spans.iter().enumerate() {
        let outer = spans.iter().position(|outer| {
            outer.kind != inner.kind
                && outer.start + MARKER_LEN == inner.start
                && inner.end + MARKER_LEN == outer.end
        });
        if let Some(j) = outer {
            if !absorbed[j] && !absorbed[i] {
                absorbed[i] = true;
                absorbed[j] = true;
                merged.push(FormatSpan {
                    kind: FormatKind::BoldItalic,
                    start: inner.start,
                    end: inner.end,
                });
            }
        }
    }

    merged.extend(spans.iter().zip(&absorbed).filter(|(_, a)| !**a).map(|(s, _)| *s));
    merged.sort_by_key(|span| (span.start, span.end));
    merged
}

/// Tokenize message text into spans, mentions and faults.
///
/// # Examples
///
/// ```
/// use beluga::models::FormatKind;
/// use beluga::tokenizer::tokenize;
///
/// let markup = tokenize("Hi __there__ @Bob!");
/// assert_eq!(markup.spans.len(), 1);
/// assert_eq!(markup.spans[0].kind, FormatKind::Italic);
/// assert_eq!(markup.mentions[0].name, "Bob");
/// assert!(markup.faults.is_empty());
/// ```
pub fn tokenize(text: &str) -> Markup {
    let Scan { spans, mentions, faults } = scan(text);
    Markup { spans: merge_bold_italic(&spans), mentions, faults }
}

/// Split message text into styled display runs.
///
/// Matched markers are removed; unmatched markers stay as literal text.
pub fn segments(text: &str) -> Vec<Segment> {
    let Scan { spans, mentions, .. } = scan(text);

    let is_marker = |idx: usize| {
        spans.iter().any(|s| {
            (s.start - MARKER_LEN..s.start).contains(&idx) || (s.end..s.end + MARKER_LEN).contains(&idx)
        })
    };
    let styled = |idx: usize, kind: FormatKind| {
        spans.iter().any(|s| s.kind == kind && (s.start..s.end).contains(&idx))
    };

    let mut out: Vec<Segment> = Vec::new();
    let mut last_key: Option<(bool, bool, Option<usize>)> = None;

    for (idx, c) in text.char_indices() {
        if is_marker(idx) {
            continue;
        }
        let mention = mentions.iter().position(|m| (m.start..m.end).contains(&idx));
        let key = (styled(idx, FormatKind::Bold), styled(idx, FormatKind::Italic), mention);

        match out.last_mut() {
            Some(segment) if last_key == Some(key) => segment.text.push(c),
            _ => out.push(Segment {
                text: c.to_string(),
                bold: key.0,
                italic: key.1,
                mention: key.2.is_some(),
            }),
        }
        last_key = Some(key);
    }

    out
}
