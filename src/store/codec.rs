//! Lossless PNG encoding of quantized frames.
//!
//! One RGBA pixel per cell:
//! - R: bit 7 set when the cell has a color, bits 0-4 hold glyph bits 16-20
//! - G: glyph bits 8-15
//! - B: glyph bits 0-7
//! - A: color index (0 when the cell has no color)

use image::{Rgba, RgbaImage};
use std::time::Duration;

use super::StoreError;
use crate::frame::{Cell, QuantizedFrame};

const HAS_COLOR: u8 = 0x80;
const HIGH_BITS: u8 = 0x1F;

/// Encode a frame as an RGBA image of the same grid size.
pub fn encode_frame(frame: &QuantizedFrame) -> RgbaImage {
    let width = frame.width() as u32;
    let mut image = RgbaImage::new(width, frame.height() as u32);

    for (i, cell) in frame.cells().iter().enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        image.put_pixel(x, y, encode_cell(cell));
    }

    image
}

fn encode_cell(cell: &Cell) -> Rgba<u8> {
    let cp = cell.glyph as u32;
    let flag = if cell.color.is_some() { HAS_COLOR } else { 0 };
    Rgba([
        flag | ((cp >> 16) as u8 & HIGH_BITS),
        (cp >> 8) as u8,
        cp as u8,
        cell.color.unwrap_or(0),
    ])
}

/// Decode a frame written by [`encode_frame`].
pub fn decode_frame(
    image: &RgbaImage,
    index: u64,
    timestamp: Duration,
) -> Result<QuantizedFrame, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt { index, reason };

    let width = u16::try_from(image.width())
        .map_err(|_| corrupt(format!("width {} out of range", image.width())))?;
    let height = u16::try_from(image.height())
        .map_err(|_| corrupt(format!("height {} out of range", image.height())))?;

    let mut cells = Vec::with_capacity(width as usize * height as usize);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let cp = (((r & HIGH_BITS) as u32) << 16) | ((g as u32) << 8) | b as u32;
        let glyph = char::from_u32(cp).ok_or_else(|| corrupt(format!("invalid glyph {:#x}", cp)))?;
        let color = if r & HAS_COLOR != 0 { Some(a) } else { None };
        cells.push(Cell { glyph, color });
    }

    QuantizedFrame::new(index, timestamp, width, height, cells)
        .ok_or_else(|| corrupt("cell count does not match dimensions".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_encoding_keeps_unicode_glyphs() {
        let cells = vec![
            Cell { glyph: '█', color: Some(196) },
            Cell { glyph: ' ', color: None },
            Cell { glyph: '@', color: Some(0) },
            Cell { glyph: '\u{10FFFF}', color: None },
        ];
        let frame = QuantizedFrame::new(7, Duration::from_millis(233), 2, 2, cells).unwrap();
        let image = encode_frame(&frame);
        assert_eq!(image.dimensions(), (2, 2));

        let decoded = decode_frame(&image, 7, Duration::from_millis(233)).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_color_zero_distinct_from_no_color() {
        let with = encode_cell(&Cell { glyph: '#', color: Some(0) });
        let without = encode_cell(&Cell { glyph: '#', color: None });
        assert_ne!(with, without);
    }

    #[test]
    fn test_invalid_glyph_is_corrupt() {
        // 0xD800 is a surrogate, not a valid char
        let image = RgbaImage::from_pixel(1, 1, Rgba([0x00, 0xD8, 0x00, 0]));
        assert!(matches!(
            decode_frame(&image, 1, Duration::ZERO),
            Err(StoreError::Corrupt { index: 1, .. })
        ));
    }
}
