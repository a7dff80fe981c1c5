//! Pixel block to glyph/color quantization.

use super::charset::Charset;
use super::luminance::luminance;
use super::palette::{nearest, ColorMode, Rgb};
use crate::frame::{Cell, PixelFormat, QuantizedFrame, RawFrame};

/// Errors raised while quantizing a frame. The frame is dropped by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantizeError {
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(usize),

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("empty pixel block")]
    EmptyBlock,

    #[error("frame has zero width or height")]
    ZeroDimensions,
}

/// Options that control how a pixel block becomes a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuantizeOptions {
    pub charset: Charset,
    /// Map `255 - brightness` instead of brightness (light terminals)
    pub invert: bool,
    pub color: ColorMode,
}

/// Index into a ramp of `levels` glyphs for a brightness value.
///
/// `floor(brightness / 256 * levels)`, clamped to `[0, levels - 1]`.
#[inline]
pub fn glyph_index(brightness: u8, levels: usize) -> usize {
    if levels == 0 {
        return 0;
    }
    (brightness as usize * levels / 256).min(levels - 1)
}

/// Quantize one block of samples (`channels` bytes per pixel).
///
/// The block's mean color decides both outputs: its luminance picks the
/// glyph, and when color is enabled the nearest palette entry picks the
/// color index.
pub fn quantize(block: &[u8], channels: usize, options: &QuantizeOptions) -> Result<Cell, QuantizeError> {
    let format =
        PixelFormat::from_channels(channels).ok_or(QuantizeError::UnsupportedChannels(channels))?;
    if block.is_empty() {
        return Err(QuantizeError::EmptyBlock);
    }
    if block.len() % channels != 0 {
        return Err(QuantizeError::LengthMismatch {
            expected: block.len() - block.len() % channels + channels,
            actual: block.len(),
        });
    }

    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for pixel in block.chunks_exact(channels) {
        match format {
            PixelFormat::Rgb => {
                sums[0] += pixel[0] as u64;
                sums[1] += pixel[1] as u64;
                sums[2] += pixel[2] as u64;
            }
            PixelFormat::Luma => {
                sums[0] += pixel[0] as u64;
                sums[1] += pixel[0] as u64;
                sums[2] += pixel[0] as u64;
            }
        }
        count += 1;
    }

    let mean = Rgb::new(
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    );
    Ok(quantize_color(mean, options))
}

/// Quantize an already averaged block color.
#[inline]
pub fn quantize_color(mean: Rgb, options: &QuantizeOptions) -> Cell {
    let glyphs = options.charset.glyphs();
    let brightness = luminance(mean.r, mean.g, mean.b);
    let brightness = if options.invert { 255 - brightness } else { brightness };
    let glyph = glyphs
        .get(glyph_index(brightness, glyphs.len()))
        .copied()
        .unwrap_or(' ');
    let color = options.color.palette().map(|palette| nearest(mean, palette));
    Cell { glyph, color }
}

/// Converts whole raw frames into glyph frames of a fixed grid size.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    options: QuantizeOptions,
    cols: u16,
    rows: u16,
}

impl Quantizer {
    pub fn new(options: QuantizeOptions, cols: u16, rows: u16) -> Self {
        Self { options, cols, rows }
    }

    pub fn options(&self) -> &QuantizeOptions {
        &self.options
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Quantize a raw frame onto the `cols x rows` grid.
    ///
    /// Each cell covers a rectangular block of source pixels (area
    /// averaging). A frame already scaled to the grid maps one pixel per cell.
    pub fn quantize_frame(&self, raw: &RawFrame) -> Result<QuantizedFrame, QuantizeError> {
        let format = PixelFormat::from_channels(raw.channels)
            .ok_or(QuantizeError::UnsupportedChannels(raw.channels))?;
        if raw.width == 0 || raw.height == 0 || self.cols == 0 || self.rows == 0 {
            return Err(QuantizeError::ZeroDimensions);
        }
        if raw.data.len() != raw.expected_len() {
            return Err(QuantizeError::LengthMismatch {
                expected: raw.expected_len(),
                actual: raw.data.len(),
            });
        }

        let channels = raw.channels;
        let width = raw.width as usize;
        let x_bounds = block_bounds(raw.width, self.cols);
        let y_bounds = block_bounds(raw.height, self.rows);

        let mut cells = Vec::with_capacity(self.cols as usize * self.rows as usize);
        for &(start_y, end_y) in &y_bounds {
            for &(start_x, end_x) in &x_bounds {
                let mut sums = [0u64; 3];
                let mut count = 0u64;

                for py in start_y..end_y {
                    let row = py * width;
                    for px in start_x..end_x {
                        let idx = (row + px) * channels;
                        match format {
                            PixelFormat::Rgb => {
                                sums[0] += raw.data[idx] as u64;
                                sums[1] += raw.data[idx + 1] as u64;
                                sums[2] += raw.data[idx + 2] as u64;
                            }
                            PixelFormat::Luma => {
                                let v = raw.data[idx] as u64;
                                sums[0] += v;
                                sums[1] += v;
                                sums[2] += v;
                            }
                        }
                        count += 1;
                    }
                }

                let mean = Rgb::new(
                    (sums[0] / count) as u8,
                    (sums[1] / count) as u8,
                    (sums[2] / count) as u8,
                );
                cells.push(quantize_color(mean, &self.options));
            }
        }

        QuantizedFrame::new(raw.index, raw.timestamp, self.cols, self.rows, cells)
            .ok_or(QuantizeError::ZeroDimensions)
    }
}

/// Pixel ranges `[start, end)` covered by each of `cells` cells along an axis
/// of `pixels` pixels. Every range holds at least one pixel.
fn block_bounds(pixels: u32, cells: u16) -> Vec<(usize, usize)> {
    let pixels = pixels as usize;
    let cells = cells as usize;
    (0..cells)
        .map(|c| {
            let start = (c * pixels / cells).min(pixels - 1);
            let end = ((c + 1) * pixels / cells).clamp(start + 1, pixels);
            (start, end)
        })
        .collect()
}
