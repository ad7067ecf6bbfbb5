//! Chat card rendering to image buffers
//!
//! [`Renderer`] is the seam between the compositor and pixel drawing. The
//! bundled [`CardRenderer`] draws a dark chat card with the `image` crate:
//! a circular avatar, a bar in the character's role color standing in for the
//! name, and one block per glyph of message text. Glyphs are boxes rather
//! than font outlines; font handling is left to other renderers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use thiserror::Error;
use tracing::debug;

use crate::models::{Character, Event, MessageEvent};
use crate::tokenizer::{segments, Segment};

/// Error raised while rendering one event
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot load avatar '{}': {source}", path.display())]
    Avatar {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("render failed on line {line}: {message}")]
    Failed { line: usize, message: String },
}

/// Draws one event as a still image.
///
/// Implementations must be deterministic: the same event and character
/// always produce the same pixels. They are called from several worker
/// threads at once.
pub trait Renderer: Sync {
    fn render(&self, event: &Event, character: &Character) -> Result<RgbaImage, RenderError>;
}

const BACKGROUND: Rgba<u8> = Rgba([54, 57, 63, 255]);
const TIME_COLOR: Rgba<u8> = Rgba([148, 155, 164, 255]);
const MESSAGE_COLOR: Rgba<u8> = Rgba([220, 222, 225, 255]);
const MENTION_BACKGROUND: Rgba<u8> = Rgba([74, 75, 114, 255]);
const MENTION_COLOR: Rgba<u8> = Rgba([201, 205, 251, 255]);
const JOINED_COLOR: Rgba<u8> = Rgba([157, 161, 164, 255]);
const JOIN_ARROW: Rgba<u8> = Rgba([59, 165, 93, 255]);

/// Layout of a card at 1280x720; other sizes scale from it.
const BASE_WIDTH: u32 = 1280;
const BASE_HEIGHT: u32 = 720;
const AVATAR_SIZE: u32 = 120;
const AVATAR_X: u32 = 36;
const AVATAR_Y: u32 = 45;
const TEXT_X: u32 = 190;
const NAME_Y: u32 = 50;
const NAME_HEIGHT: u32 = 28;
const MESSAGE_Y: u32 = 110;
const GLYPH_WIDTH: u32 = 14;
const GLYPH_HEIGHT: u32 = 22;
const LINE_HEIGHT: u32 = 34;

/// Reference renderer producing Discord-style chat cards.
pub struct CardRenderer {
    width: u32,
    height: u32,
    avatars: Mutex<HashMap<PathBuf, RgbaImage>>,
}

impl Default for CardRenderer {
    fn default() -> Self {
        Self::new(BASE_WIDTH, BASE_HEIGHT)
    }
}

impl CardRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: width.max(1), height: height.max(1), avatars: Mutex::new(HashMap::new()) }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn scale(&self, v: u32) -> u32 {
        (u64::from(v) * u64::from(self.width) / u64::from(BASE_WIDTH)).max(1) as u32
    }

    /// Decode, resize and mask an avatar once per path.
    fn avatar(&self, path: &Path) -> Result<RgbaImage, RenderError> {
        let mut cache = self.avatars.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(avatar) = cache.get(path) {
            return Ok(avatar.clone());
        }

        let size = self.scale(AVATAR_SIZE);
        let decoded = image::open(path)
            .map_err(|source| RenderError::Avatar { path: path.to_path_buf(), source })?;
        let mut avatar = imageops::resize(&decoded.to_rgba8(), size, size, FilterType::Triangle);
        mask_circle(&mut avatar);

        debug!(avatar = %path.display(), size, "cached avatar");
        cache.insert(path.to_path_buf(), avatar.clone());
        Ok(avatar)
    }

    fn draw_header(&self, canvas: &mut RgbaImage, character: &Character) -> Result<(), RenderError> {
        let avatar = self.avatar(&character.avatar)?;
        imageops::overlay(
            canvas,
            &avatar,
            i64::from(self.scale(AVATAR_X)),
            i64::from(self.scale(AVATAR_Y)),
        );

        let [r, g, b] = character.color.0;
        let name_width = self.scale(GLYPH_WIDTH) * character.name.chars().count().max(1) as u32;
        let x = self.scale(TEXT_X);
        let y = self.scale(NAME_Y);
        let h = self.scale(NAME_HEIGHT);
        fill_rect(canvas, x, y, name_width, h, Rgba([r, g, b, 255]));

        // timestamp
        let gap = self.scale(GLYPH_WIDTH);
        fill_rect(canvas, x + name_width + gap, y + h / 4, gap * 5, h / 2, TIME_COLOR);
        Ok(())
    }

    fn draw_message(&self, canvas: &mut RgbaImage, message: &MessageEvent) {
        let left = self.scale(TEXT_X);
        let right = self.width.saturating_sub(self.scale(40));
        let glyph_w = self.scale(GLYPH_WIDTH);
        let line_h = self.scale(LINE_HEIGHT);
        let mut x = left;
        let mut y = self.scale(MESSAGE_Y);

        for segment in segments(&message.text) {
            for c in segment.text.chars() {
                if x + glyph_w > right {
                    x = left;
                    y += line_h;
                }
                if y >= self.height {
                    return;
                }
                self.draw_glyph(canvas, x, y, c, &segment);
                x += glyph_w;
            }
        }
    }

    fn draw_glyph(&self, canvas: &mut RgbaImage, x: u32, y: u32, c: char, segment: &Segment) {
        let glyph_w = self.scale(GLYPH_WIDTH);
        let glyph_h = self.scale(GLYPH_HEIGHT);

        if segment.mention {
            fill_rect(canvas, x, y, glyph_w, glyph_h, MENTION_BACKGROUND);
        }
        if c.is_whitespace() {
            return;
        }

        let color = if segment.mention { MENTION_COLOR } else { MESSAGE_COLOR };
        let inset = self.scale(2);
        let (top, height) = if segment.bold {
            (y, glyph_h)
        } else {
            (y + inset * 2, glyph_h.saturating_sub(inset * 2))
        };
        // italics lean right by shifting the glyph box
        let left = if segment.italic { x + inset * 2 } else { x + inset };
        fill_rect(canvas, left, top, glyph_w.saturating_sub(inset * 2), height, color);
    }

    fn draw_join(&self, canvas: &mut RgbaImage, character: &Character) -> Result<(), RenderError> {
        self.draw_header(canvas, character)?;

        let x = self.scale(TEXT_X);
        let y = self.scale(MESSAGE_Y);
        let unit = self.scale(6);
        // arrow: shaft then a stepped head
        fill_rect(canvas, x, y + unit * 2, unit * 4, unit, JOIN_ARROW);
        for step in 0..3 {
            let offset = unit * step;
            fill_rect(canvas, x + unit * 4 + offset, y + offset, unit, unit * 5 - offset * 2, JOIN_ARROW);
        }

        let glyph_w = self.scale(GLYPH_WIDTH);
        let glyph_h = self.scale(GLYPH_HEIGHT);
        let text_x = x + unit * 10;
        let [r, g, b] = character.color.0;
        let name_w = glyph_w * character.name.chars().count().max(1) as u32;
        fill_rect(canvas, text_x, y, name_w, glyph_h, Rgba([r, g, b, 255]));
        fill_rect(canvas, text_x + name_w + glyph_w, y, glyph_w * 12, glyph_h, JOINED_COLOR);
        Ok(())
    }
}

impl Renderer for CardRenderer {
    fn render(&self, event: &Event, character: &Character) -> Result<RgbaImage, RenderError> {
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        match event {
            Event::Join(_) => self.draw_join(&mut canvas, character)?,
            Event::Message(message) => {
                self.draw_header(&mut canvas, character)?;
                self.draw_message(&mut canvas, message);
            }
        }
        Ok(canvas)
    }
}

/// Fill a rectangle, clipped to the image bounds.
fn fill_rect(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(w).min(image.width());
    let y_end = y.saturating_add(h).min(image.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            image.put_pixel(px, py, color);
        }
    }
}

/// Make every pixel outside the inscribed circle transparent.
fn mask_circle(image: &mut RgbaImage) {
    let radius = image.width().min(image.height()) as f64 / 2.0;
    let (cx, cy) = (image.width() as f64 / 2.0, image.height() as f64 / 2.0);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        if dx * dx + dy * dy > radius * radius {
            pixel.0[3] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use image::Rgb;
    use tempfile::tempdir;

    fn character_with_avatar(dir: &Path) -> Character {
        let avatar = dir.join("alex.png");
        RgbaImage::from_pixel(8, 8, Rgba([200, 30, 30, 255])).save(&avatar).unwrap();
        Character { name: "Alex".to_string(), color: Rgb([88, 101, 242]), avatar }
    }

    fn event(source: &str) -> Event {
        parse_script(source).unwrap().events.remove(0)
    }

    #[test]
    fn test_render_message_card() {
        let dir = tempdir().unwrap();
        let character = character_with_avatar(dir.path());
        let renderer = CardRenderer::new(320, 180);

        let image = renderer.render(&event("Alex:\nhi **there**$^1\n"), &character).unwrap();
        assert_eq!(image.dimensions(), (320, 180));
        assert_eq!(*image.get_pixel(0, 0), BACKGROUND);

        // name bar in role color at the scaled text origin
        let name = image.get_pixel(renderer.scale(TEXT_X), renderer.scale(NAME_Y));
        assert_eq!(*name, Rgba([88, 101, 242, 255]));

        // avatar center is opaque, corner is background
        let center = renderer.scale(AVATAR_X) + renderer.scale(AVATAR_SIZE) / 2;
        let center_y = renderer.scale(AVATAR_Y) + renderer.scale(AVATAR_SIZE) / 2;
        assert_eq!(image.get_pixel(center, center_y).0[0], 200);
        assert_eq!(*image.get_pixel(renderer.scale(AVATAR_X), renderer.scale(AVATAR_Y)), BACKGROUND);
    }

    #[test]
    fn test_render_is_deterministic() {
        let dir = tempdir().unwrap();
        let character = character_with_avatar(dir.path());
        let renderer = CardRenderer::new(320, 180);
        let ev = event("Alex:\n__a__ @Bob **b**$^1\n");

        let first = renderer.render(&ev, &character).unwrap();
        let second = renderer.render(&ev, &character).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_join_draws_arrow() {
        let dir = tempdir().unwrap();
        let character = character_with_avatar(dir.path());
        let renderer = CardRenderer::default();

        let image = renderer.render(&event("WELCOME Alex$^2\n"), &character).unwrap();
        let unit = renderer.scale(6);
        let shaft = image.get_pixel(renderer.scale(TEXT_X), renderer.scale(MESSAGE_Y) + unit * 2);
        assert_eq!(*shaft, JOIN_ARROW);
    }

    #[test]
    fn test_missing_avatar_is_error() {
        let character = Character {
            name: "Ghost".to_string(),
            color: Rgb([1, 1, 1]),
            avatar: PathBuf::from("/nonexistent/ghost.png"),
        };
        let err = CardRenderer::new(64, 36).render(&event("WELCOME Ghost$^1\n"), &character);
        assert!(matches!(err, Err(RenderError::Avatar { .. })));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut image = RgbaImage::new(4, 4);
        fill_rect(&mut image, 2, 2, 10, 10, Rgba([1, 2, 3, 255]));
        assert_eq!(*image.get_pixel(3, 3), Rgba([1, 2, 3, 255]));
        assert_eq!(*image.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
        fill_rect(&mut image, 10, 10, 2, 2, Rgba([9, 9, 9, 255]));
    }
}
