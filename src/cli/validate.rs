//! Script checking command implementations (validate, timeline, fmt)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::debug;

use crate::config::CliOverrides;
use crate::fmt::format_source;
use crate::models::{format_seconds, Event};
use crate::parser::parse_script;
use crate::pipeline::compile_script;
use crate::validate::{Diagnostic, Diagnostics, Severity, Validator};

use super::{
    format_diagnostic, load_registries, load_settings, plural, print_warnings, read_script,
    report_compile_error, EXIT_ERROR, EXIT_SUCCESS,
};

fn diagnostic_json(d: &Diagnostic) -> serde_json::Value {
    let mut obj = serde_json::json!({
        "line": d.line,
        "type": d.kind.to_string(),
        "message": d.message,
    });
    if let Some(ref sug) = d.suggestion {
        obj["suggestion"] = serde_json::json!(sug);
    }
    obj
}

/// Outcome of checking one file
struct FileReport {
    path: PathBuf,
    /// Structural failure; validation never ran
    parse_error: Option<(usize, String)>,
    diagnostics: Diagnostics,
}

impl FileReport {
    fn error_count(&self) -> usize {
        self.diagnostics.error_count() + usize::from(self.parse_error.is_some())
    }

    fn to_json(&self) -> serde_json::Value {
        let mut errors: Vec<_> = self
            .parse_error
            .iter()
            .map(|(line, message)| {
                serde_json::json!({ "line": line, "type": "parse_error", "message": message })
            })
            .collect();
        errors.extend(self.diagnostics.iter().filter(|d| d.is_error()).map(diagnostic_json));
        let warnings: Vec<_> = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(diagnostic_json)
            .collect();

        serde_json::json!({
            "file": self.path.display().to_string(),
            "valid": self.error_count() == 0,
            "errors": errors,
            "warnings": warnings,
        })
    }
}

/// Execute the validate command
pub fn run_validate(
    config: Option<&Path>,
    overrides: &CliOverrides,
    files: &[PathBuf],
    json: bool,
) -> ExitCode {
    let settings = match load_settings(config, overrides) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let registries = match load_registries(&settings) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let validator =
        Validator::from_registries(&registries).with_rules(settings.validate.rules());

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        if !json {
            println!("Validating {}...", path.display());
        }
        let source = match read_script(path) {
            Ok(s) => s,
            Err(code) => return code,
        };
        let report = match parse_script(&source) {
            Ok(script) => FileReport {
                path: path.clone(),
                parse_error: None,
                diagnostics: validator.check(&script),
            },
            Err(e) => FileReport {
                path: path.clone(),
                parse_error: Some((e.line, e.kind.to_string())),
                diagnostics: Diagnostics::new(),
            },
        };
        reports.push(report);
    }

    let error_count: usize = reports.iter().map(FileReport::error_count).sum();
    let warning_count: usize = reports.iter().map(|r| r.diagnostics.warning_count()).sum();

    if json {
        let output = serde_json::json!({
            "valid": error_count == 0,
            "files": reports.iter().map(FileReport::to_json).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        for report in &reports {
            if let Some((line, message)) = &report.parse_error {
                eprintln!("{}: Line {}: ERROR - {}", report.path.display(), line, message);
            }
            for diagnostic in &report.diagnostics {
                eprintln!("{}: {}", report.path.display(), format_diagnostic(diagnostic));
            }
        }

        println!();
        match (error_count, warning_count) {
            (0, 0) => println!("No issues found."),
            (0, w) => println!("Found {} warning{}.", w, plural(w)),
            (e, 0) => println!("Found {} error{}.", e, plural(e)),
            (e, w) => println!("Found {} error{}, {} warning{}.", e, plural(e), w, plural(w)),
        }
        if !settings.validate.strict && warning_count > 0 && error_count == 0 {
            println!("Hint: Run with --strict to treat warnings as errors.");
        }
    }

    if error_count > 0 {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}

/// Execute the timeline command
pub fn run_timeline(
    config: Option<&Path>,
    overrides: &CliOverrides,
    file: &Path,
    json: bool,
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

    let timeline = &compiled.timeline;
    if json {
        match serde_json::to_string_pretty(&timeline.summary()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    for timed in timeline.events() {
        let what = match &timed.event {
            Event::Join(join) => format!("{} joined", join.character),
            Event::Message(message) => format!("{}: {}", message.character, message.text),
        };
        let mut row = format!(
            "{:>8} - {:>8}  {:<7}  {}",
            format_seconds(timed.start),
            format_seconds(timed.end),
            timed.event.kind_name(),
            what
        );
        if let Some(sound) = timed.event.sound() {
            row.push_str(&format!("  [#!{}]", sound));
        }
        println!("{}", row);
    }

    let cues = timeline.sound_cues().len();
    println!();
    println!(
        "Total: {}s, {} event{}, {} sound cue{}",
        format_seconds(timeline.total_duration()),
        timeline.len(),
        plural(timeline.len()),
        cues,
        plural(cues)
    );
    ExitCode::from(EXIT_SUCCESS)
}

/// Execute the fmt command
///
/// Every file is checked before anything is written, so a parse error in a
/// later file leaves earlier files untouched.
pub fn run_fmt(files: &[PathBuf], check: bool, stdout_mode: bool) -> ExitCode {
    let mut pending = Vec::with_capacity(files.len());
    for file in files {
        let source = match read_script(file) {
            Ok(s) => s,
            Err(code) => return code,
        };
        match format_source(&source) {
            Ok(formatted) => pending.push((file, formatted != source, formatted)),
            Err(e) => {
                eprintln!("{}: Line {}: ERROR - {}", file.display(), e.line, e.kind);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    let mut unformatted = 0;
    for (file, changed, formatted) in pending {
        debug!(file = %file.display(), changed, "formatted script");
        if stdout_mode {
            print!("{}", formatted);
        } else if !changed {
            if !check {
                eprintln!("{}: already formatted", file.display());
            }
        } else if check {
            eprintln!("{}: needs formatting", file.display());
            unformatted += 1;
        } else {
            if let Err(e) = std::fs::write(file, &formatted) {
                eprintln!("Error: Cannot write '{}': {}", file.display(), e);
                return ExitCode::from(EXIT_ERROR);
            }
            eprintln!("{}: formatted", file.display());
        }
    }

    if unformatted > 0 {
        eprintln!("{} file{} need formatting", unformatted, plural(unformatted));
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}
