//! Parse, validate and compile a script in one call

use thiserror::Error;
use tracing::info;

use crate::models::format_seconds;
use crate::parser::{parse_script, ParseError};
use crate::registry::Registries;
use crate::timeline::Timeline;
use crate::validate::{Diagnostics, ValidationRules, Validator};

/// Why a script could not be compiled.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("script has {} error(s)", .0.error_count())]
    Invalid(Diagnostics),
}

/// A compiled timeline together with the warnings raised on the way.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub timeline: Timeline,
    pub warnings: Diagnostics,
}

/// Compile script source into a timeline.
///
/// Either the whole script compiles or the caller gets the full list of
/// problems; there is no partial timeline.
///
/// # Examples
///
/// ```
/// use beluga::pipeline::{compile_script, CompileError};
/// use beluga::registry::Registries;
/// use beluga::validate::ValidationRules;
///
/// let registries = Registries::default();
/// let err = compile_script("WELCOME Alex$^2\n", &registries, &ValidationRules::default());
/// assert!(matches!(err, Err(CompileError::Invalid(_))));
/// ```
pub fn compile_script(
    source: &str,
    registries: &Registries,
    rules: &ValidationRules,
) -> Result<Compiled, CompileError> {
    let script = parse_script(source)?;
    let valid = Validator::from_registries(registries)
        .with_rules(rules.clone())
        .validate(script)
        .map_err(CompileError::Invalid)?;

    let timeline = Timeline::compile(&valid);
    info!(
        events = timeline.len(),
        total = %format_seconds(timeline.total_duration()),
        warnings = valid.warnings().len(),
        "script compiled"
    );
    Ok(Compiled { timeline, warnings: valid.warnings().clone() })
}
