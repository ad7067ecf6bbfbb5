//! Role color parsing for character definitions
//!
//! Accepts the forms used in `characters.json`:
//! - RGB triples: `[88, 101, 242]`
//! - Hex: `#RGB`, `#RRGGBB` (an alpha channel is accepted and ignored)
//! - Any CSS color understood by lightningcss: `rebeccapurple`, `rgb(1 2 3)`, `hsl(...)`

use image::Rgb;
use lightningcss::traits::Parse;
use lightningcss::values::color::CssColor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color string")]
    Empty,
    #[error("invalid hex color length {0}, expected 3, 4, 6, or 8 digits")]
    InvalidLength(usize),
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
    #[error("CSS parse error: {0}")]
    CssParse(String),
}

/// A color as written in a character definition.
///
/// Triples are read as floats so that JSON5 readers which report every
/// number as `f64` still deserialize; components are clamped to `0..=255`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Triple([f64; 3]),
    Css(String),
}

impl ColorSpec {
    /// Resolve the spec to an RGB color.
    pub fn resolve(&self) -> Result<Rgb<u8>, ColorError> {
        match self {
            ColorSpec::Triple([r, g, b]) => {
                let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
                Ok(Rgb([channel(*r), channel(*g), channel(*b)]))
            }
            ColorSpec::Css(s) => parse_color(s),
        }
    }
}

/// Parse a color string into RGB.
///
/// ```
/// use beluga::color::parse_color;
///
/// assert_eq!(parse_color("#F00").unwrap(), image::Rgb([255, 0, 0]));
/// assert_eq!(parse_color("#5865F2").unwrap(), image::Rgb([0x58, 0x65, 0xF2]));
/// assert_eq!(parse_color("blue").unwrap(), image::Rgb([0, 0, 255]));
/// ```
pub fn parse_color(s: &str) -> Result<Rgb<u8>, ColorError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ColorError::Empty);
    }
    match s.strip_prefix('#') {
        Some(hex) => parse_hex(hex),
        None => parse_css(s),
    }
}

fn parse_hex(hex: &str) -> Result<Rgb<u8>, ColorError> {
    if let Some(c) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex(c));
    }

    // All characters are ASCII hex digits past this point, so byte slicing is safe
    // and from_str_radix cannot fail.
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).unwrap_or(0) * 17;
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);

    match hex.len() {
        3 | 4 => Ok(Rgb([digit(0), digit(1), digit(2)])),
        6 | 8 => Ok(Rgb([pair(0), pair(2), pair(4)])),
        len => Err(ColorError::InvalidLength(len)),
    }
}

fn parse_css(s: &str) -> Result<Rgb<u8>, ColorError> {
    use lightningcss::values::color::FloatColor;

    let color = CssColor::parse_string(s).map_err(|e| ColorError::CssParse(e.to_string()))?;
    let rgb = color
        .to_rgb()
        .map_err(|_| ColorError::CssParse(format!("cannot convert '{}' to RGB", s)))?;

    match rgb {
        CssColor::RGBA(rgba) => Ok(Rgb([rgba.red, rgba.green, rgba.blue])),
        CssColor::Float(float_color) => match float_color.as_ref() {
            FloatColor::RGB(rgb) => Ok(Rgb([
                (rgb.r * 255.0).round() as u8,
                (rgb.g * 255.0).round() as u8,
                (rgb.b * 255.0).round() as u8,
            ])),
            _ => Err(ColorError::CssParse("unexpected float color format".to_string())),
        },
        _ => Err(ColorError::CssParse("color conversion did not produce RGB".to_string())),
    }
}
