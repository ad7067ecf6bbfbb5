//! Semantic validation of parsed chat scripts
//!
//! The validator never stops at the first problem: every event is checked
//! and all findings are collected into [`Diagnostics`], so a single run can
//! report everything that needs fixing before a costly render.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::models::{Event, FaultKind, FormatFault, JoinEvent, MessageEvent, Script};
use crate::registry::{CharacterRegistry, Registries, SoundRegistry};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// Type of problem found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Join or message owner is not in the character registry
    UnknownCharacter,
    /// `@name` does not resolve to a character
    UnknownMention,
    /// Sound effect is not in the sound registry
    UnknownSound,
    /// Sound effect name contains characters outside `[A-Za-z0-9_-]`
    InvalidSoundName,
    /// Unmatched or crossing `**` / `__` marker
    UnbalancedFormatting,
    /// Duration outside the configured range
    DurationOutOfRange,
    /// Message text longer than the configured limit
    LineTooLong,
    /// Message with no text before the duration marker
    EmptyMessage,
    /// Running total of durations no longer fits in a timeline
    TimelineOverflow,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::UnknownCharacter => "unknown_character",
            DiagnosticKind::UnknownMention => "unknown_mention",
            DiagnosticKind::UnknownSound => "unknown_sound",
            DiagnosticKind::InvalidSoundName => "invalid_sound_name",
            DiagnosticKind::UnbalancedFormatting => "unbalanced_formatting",
            DiagnosticKind::DurationOutOfRange => "duration_range",
            DiagnosticKind::LineTooLong => "line_too_long",
            DiagnosticKind::EmptyMessage => "empty_message",
            DiagnosticKind::TimelineOverflow => "timeline_overflow",
        };
        f.write_str(name)
    }
}

/// A problem found in a script
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Line number (1-indexed) of the offending event
    pub line: usize,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Optional fix, e.g. "did you mean 'Alex'?"
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { line, severity: Severity::Error, kind, message: message.into(), suggestion: None }
    }

    pub fn warning(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self { line, severity: Severity::Warning, kind, message: message.into(), suggestion: None }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics from one validation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A script is valid when no error-severity diagnostic was found
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// Diagnostics reported for `line`
    pub fn on_line(&self, line: usize) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.line == line)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// Turn every warning into an error (strict mode)
    fn promote_warnings(&mut self) {
        for diagnostic in &mut self.items {
            diagnostic.severity = Severity::Error;
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Tunable limits for the warning-level checks
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    /// Longest message text, in characters, before a warning
    pub max_line_length: usize,
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// Treat warnings as errors
    pub strict: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_line_length: 200,
            min_duration: Duration::from_millis(100),
            max_duration: Duration::from_secs(30),
            strict: false,
        }
    }
}

/// A script that passed validation. Only the validator can build one, so
/// holding a `ValidScript` proves the registries resolve every reference.
#[derive(Debug, Clone)]
pub struct ValidScript {
    script: Script,
    warnings: Diagnostics,
}

impl ValidScript {
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Warning-level diagnostics that did not block validation
    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    pub fn into_script(self) -> Script {
        self.script
    }
}

fn sound_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("sound name regex must compile"))
}

/// Validator for parsed scripts
pub struct Validator<'a> {
    characters: &'a CharacterRegistry,
    sounds: &'a SoundRegistry,
    rules: ValidationRules,
}

impl<'a> Validator<'a> {
    pub fn new(characters: &'a CharacterRegistry, sounds: &'a SoundRegistry) -> Self {
        Self { characters, sounds, rules: ValidationRules::default() }
    }

    pub fn from_registries(registries: &'a Registries) -> Self {
        Self::new(&registries.characters, &registries.sounds)
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Check every event and collect all problems.
    pub fn check(&self, script: &Script) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for event in script {
            match event {
                Event::Join(join) => self.check_join(join, &mut diagnostics),
                Event::Message(message) => self.check_message(message, &mut diagnostics),
            }
            self.check_duration(event, &mut diagnostics);
        }
        check_total(script, &mut diagnostics);

        if self.rules.strict {
            diagnostics.promote_warnings();
        }

        debug!(
            events = script.len(),
            errors = diagnostics.error_count(),
            warnings = diagnostics.warning_count(),
            "validated script"
        );
        diagnostics
    }

    /// Validate a script, handing it back as a [`ValidScript`] only when no
    /// errors were found.
    pub fn validate(&self, script: Script) -> Result<ValidScript, Diagnostics> {
        let diagnostics = self.check(&script);
        if diagnostics.has_errors() {
            Err(diagnostics)
        } else {
            Ok(ValidScript { script, warnings: diagnostics })
        }
    }

    fn check_join(&self, join: &JoinEvent, out: &mut Diagnostics) {
        self.check_character(join.line, &join.character, out);
        if let Some(sound) = &join.sound {
            self.check_sound(join.line, sound, out);
        }
    }

    fn check_message(&self, message: &MessageEvent, out: &mut Diagnostics) {
        let line = message.line;
        self.check_character(line, &message.character, out);

        for mention in &message.mentions {
            if !self.characters.contains(&mention.name) {
                let mut diagnostic = Diagnostic::error(
                    line,
                    DiagnosticKind::UnknownMention,
                    format!("mention '@{}' does not match any character", mention.name),
                );
                if let Some(name) = suggest_name(&mention.name, &self.characters.names()) {
                    diagnostic = diagnostic.with_suggestion(format!("did you mean '@{}'?", name));
                }
                out.push(diagnostic);
            }
        }

        if let Some(fault) = message.faults.first() {
            out.push(Diagnostic::error(
                line,
                DiagnosticKind::UnbalancedFormatting,
                describe_fault(&message.text, fault),
            ));
        }

        if let Some(sound) = &message.sound {
            self.check_sound(line, sound, out);
        }

        if message.text.trim().is_empty() {
            out.push(Diagnostic::warning(line, DiagnosticKind::EmptyMessage, "message has no text"));
        }

        let length = message.text.chars().count();
        if length > self.rules.max_line_length {
            out.push(Diagnostic::warning(
                line,
                DiagnosticKind::LineTooLong,
                format!(
                    "message is {} characters long, maximum is {}",
                    length, self.rules.max_line_length
                ),
            ));
        }
    }

    fn check_character(&self, line: usize, name: &str, out: &mut Diagnostics) {
        if self.characters.contains(name) {
            return;
        }
        let mut diagnostic = Diagnostic::error(
            line,
            DiagnosticKind::UnknownCharacter,
            format!("unknown character '{}'", name),
        );
        if let Some(suggestion) = suggest_name(name, &self.characters.names()) {
            diagnostic = diagnostic.with_suggestion(format!("did you mean '{}'?", suggestion));
        }
        out.push(diagnostic);
    }

    fn check_sound(&self, line: usize, name: &str, out: &mut Diagnostics) {
        if !sound_name_pattern().is_match(name) {
            out.push(Diagnostic::error(
                line,
                DiagnosticKind::InvalidSoundName,
                format!("invalid sound effect name '{}'", name),
            ));
            return;
        }
        if self.sounds.contains(name) {
            return;
        }
        let mut diagnostic = Diagnostic::error(
            line,
            DiagnosticKind::UnknownSound,
            format!("sound effect '{}' not found", name),
        );
        if let Some(suggestion) = suggest_name(name, &self.sounds.names()) {
            diagnostic = diagnostic.with_suggestion(format!("did you mean '{}'?", suggestion));
        }
        out.push(diagnostic);
    }

    fn check_duration(&self, event: &Event, out: &mut Diagnostics) {
        let duration = event.duration();
        if duration < self.rules.min_duration || duration > self.rules.max_duration {
            out.push(Diagnostic::warning(
                event.line(),
                DiagnosticKind::DurationOutOfRange,
                format!(
                    "duration {:.2}s is outside the allowed range {}-{}s",
                    duration.as_secs_f64(),
                    self.rules.min_duration.as_secs_f64(),
                    self.rules.max_duration.as_secs_f64()
                ),
            ));
        }
    }
}

/// The timeline's running offset must stay representable; report the first
/// event that pushes it past `Duration::MAX`.
fn check_total(script: &Script, out: &mut Diagnostics) {
    let mut total = Duration::ZERO;
    for event in script {
        match total.checked_add(event.duration()) {
            Some(next) => total = next,
            None => {
                out.push(Diagnostic::error(
                    event.line(),
                    DiagnosticKind::TimelineOverflow,
                    format!(
                        "duration {}s pushes the script past the longest representable timeline",
                        event.duration().as_secs()
                    ),
                ));
                return;
            }
        }
    }
}

fn describe_fault(text: &str, fault: &FormatFault) -> String {
    let marker = fault.marker.marker().unwrap_or("**");
    let column = text[..fault.offset].chars().count() + 1;
    match fault.kind {
        FaultKind::Unclosed => format!("unmatched `{}` at column {}", marker, column),
        FaultKind::Crossing => {
            format!("`{}` at column {} closes across another open span", marker, column)
        }
    }
}

/// Find the closest known name to `unknown`, if any is within edit distance 2.
pub fn suggest_name(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|name| (levenshtein_distance(unknown, name), *name))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, name)| name.to_string())
}

/// Levenshtein edit distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
