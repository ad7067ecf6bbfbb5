//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod info;
mod render;
mod validate;

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::config::{load_config, merge_cli_overrides, BelugaConfig, CliOverrides};
use crate::pipeline::CompileError;
use crate::registry::Registries;
use crate::validate::{Diagnostic, Severity};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Beluga - Compile chat scripts into timed chat videos
#[derive(Parser)]
#[command(name = "beluga")]
#[command(about = "Beluga - Compile chat scripts into timed chat videos")]
#[command(version)]
pub struct Cli {
    /// Path to beluga.toml (default: search upward from the working directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Character definitions file, overriding the config
    #[arg(long, global = true, value_name = "FILE")]
    pub characters: Option<PathBuf>,

    /// Sound effects directory, overriding the config
    #[arg(long, global = true, value_name = "DIR")]
    pub sounds: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check scripts for errors without rendering
    Validate {
        /// Script files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Strict mode: treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a script and print its timeline
    Timeline {
        /// Script file
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a script to a frame sequence or an animated GIF
    Render {
        /// Script file
        file: PathBuf,

        /// Output directory for frames (default: <video.out>/<script name>)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Write an animated GIF instead of a frame sequence
        #[arg(long, value_name = "FILE")]
        gif: Option<PathBuf>,

        /// Number of render workers
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Frames per second
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=240))]
        fps: Option<u32>,

        /// Strict mode: treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Rewrite scripts in canonical form
    Fmt {
        /// Script files to format
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Check formatting without writing (exit 1 if changes needed)
        #[arg(long, conflicts_with = "stdout")]
        check: bool,

        /// Print formatted output instead of writing files
        #[arg(long)]
        stdout: bool,
    },

    /// List available sound effects
    Sounds {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered characters
    Characters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the script formatting guide
    Guide,
}

/// Install the tracing subscriber. Logs go to stderr so they never mix with
/// command output.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load the configuration with CLI overrides applied.
pub(crate) fn load_settings(
    config: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<BelugaConfig, ExitCode> {
    let mut settings = load_config(config).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;
    merge_cli_overrides(&mut settings, overrides);
    Ok(settings)
}

/// Load both registries named by the configuration.
pub(crate) fn load_registries(settings: &BelugaConfig) -> Result<Registries, ExitCode> {
    Registries::load(&settings.characters_path(), &settings.sounds_path()).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })
}

pub(crate) fn read_script(path: &Path) -> Result<String, ExitCode> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: Cannot read '{}': {}", path.display(), e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })
}

/// One diagnostic as a text line
pub(crate) fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let mut msg = format!(
        "Line {}: {} - {}",
        diagnostic.line, diagnostic.severity, diagnostic.message
    );
    if let Some(ref sug) = diagnostic.suggestion {
        msg.push_str(&format!(" ({})", sug));
    }
    msg
}

/// Print a compile failure for `file` and return the error exit code.
pub(crate) fn report_compile_error(file: &Path, err: &CompileError) -> ExitCode {
    match err {
        CompileError::Parse(e) => {
            eprintln!("{}: Line {}: ERROR - {}", file.display(), e.line, e.kind);
        }
        CompileError::Invalid(diagnostics) => {
            for diagnostic in diagnostics {
                eprintln!("{}: {}", file.display(), format_diagnostic(diagnostic));
            }
            eprintln!("{}", err);
        }
    }
    ExitCode::from(EXIT_ERROR)
}

pub(crate) fn print_warnings(file: &Path, warnings: &[Diagnostic]) {
    for warning in warnings.iter().filter(|d| d.severity == Severity::Warning) {
        eprintln!("{}: {}", file.display(), format_diagnostic(warning));
    }
}

pub(crate) fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let base = CliOverrides {
        characters: cli.characters.clone(),
        sounds: cli.sounds.clone(),
        ..Default::default()
    };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Validate { files, strict, json } => {
            let overrides = CliOverrides { strict: strict.then_some(true), ..base };
            validate::run_validate(config, &overrides, &files, json)
        }
        Commands::Timeline { file, json } => validate::run_timeline(config, &base, &file, json),
        Commands::Render { file, output, gif, jobs, fps, strict } => {
            let overrides = CliOverrides {
                out: output.clone(),
                fps,
                jobs,
                strict: strict.then_some(true),
                ..base
            };
            render::run_render(config, &overrides, &file, output.is_some(), gif.as_deref())
        }
        Commands::Fmt { files, check, stdout } => validate::run_fmt(&files, check, stdout),
        Commands::Sounds { json } => info::run_sounds(config, &base, json),
        Commands::Characters { json } => info::run_characters(config, &base, json),
        Commands::Guide => info::run_guide(),
    }
}
