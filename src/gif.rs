//! Animated GIF encoding

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::output::{ensure_parent, OutputError};

/// GIF delay for a frame shown for `hold`, in centiseconds.
///
/// GIF delays are whole centiseconds; anything shorter is shown for one.
pub fn delay_centiseconds(hold: Duration) -> u16 {
    let cs = (hold.as_millis() + 5) / 10;
    cs.clamp(1, u128::from(u16::MAX)) as u16
}

/// Write `frames` as an animated GIF, each image held for its duration.
pub fn render_gif(
    frames: &[(&RgbaImage, Duration)],
    loop_anim: bool,
    path: &Path,
) -> Result<(), OutputError> {
    if frames.is_empty() {
        return Ok(());
    }
    ensure_parent(path)?;

    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = GifEncoder::new(writer);
    encoder.set_repeat(if loop_anim { Repeat::Infinite } else { Repeat::Finite(0) })?;

    for (image, hold) in frames {
        let delay = Delay::from_numer_denom_ms(u32::from(delay_centiseconds(*hold)) * 10, 1);
        encoder.encode_frame(Frame::from_parts((*image).clone(), 0, 0, delay))?;
    }

    Ok(())
}
