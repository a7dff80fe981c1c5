//! Frame types shared by the producer, the frame store and the renderer.

use std::time::Duration;

/// Sample layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One luminance byte per pixel
    Luma,
    /// Three bytes per pixel, R G B
    Rgb,
}

impl PixelFormat {
    /// Number of bytes per pixel for this format.
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Luma => 1,
            PixelFormat::Rgb => 3,
        }
    }

    /// Map a channel count back to a format, if it is one we understand.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Luma),
            3 => Some(PixelFormat::Rgb),
            _ => None,
        }
    }
}

/// A decoded source frame.
///
/// Produced once per kept source frame and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Source frame index (0-based, in decode order)
    pub index: u64,
    /// Presentation time, `index / source_fps`
    pub timestamp: Duration,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel as delivered by the source
    pub channels: usize,
    /// Row-major pixel data
    pub data: Vec<u8>,
}

impl RawFrame {
    /// Build an RGB frame, deriving the timestamp from the source frame rate.
    pub fn rgb(index: u64, source_fps: f64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            timestamp: presentation_time(index, source_fps),
            width,
            height,
            channels: 3,
            data,
        }
    }

    /// Build a luminance-only frame.
    pub fn luma(index: u64, source_fps: f64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            timestamp: presentation_time(index, source_fps),
            width,
            height,
            channels: 1,
            data,
        }
    }

    /// Number of bytes a well-formed frame of these dimensions carries.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels
    }
}

/// Presentation timestamp for a source frame index.
pub fn presentation_time(index: u64, source_fps: f64) -> Duration {
    if source_fps <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(index as f64 / source_fps)
}

/// One terminal cell of a quantized frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    /// Palette index (0-7 or 0-255 depending on color mode)
    pub color: Option<u8>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            color: None,
        }
    }
}

/// Glyph frame ready for display.
///
/// Dimensions are the terminal grid captured at session start and are
/// fixed once the frame exists.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedFrame {
    index: u64,
    timestamp: Duration,
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl QuantizedFrame {
    /// Assemble a frame from row-major cells.
    ///
    /// Returns `None` when the cell count does not match the dimensions.
    pub fn new(
        index: u64,
        timestamp: Duration,
        width: u16,
        height: u16,
        cells: Vec<Cell>,
    ) -> Option<Self> {
        if cells.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            index,
            timestamp,
            width,
            height,
            cells,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether any cell carries a color index.
    pub fn has_color(&self) -> bool {
        self.cells.iter().any(|c| c.color.is_some())
    }

    /// Iterate over rows of cells.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        // chunks() panics on 0, and a zero-width frame has no cells anyway
        self.cells.chunks(self.width.max(1) as usize)
    }

    /// Glyphs only, one line per row (used by tests and the log).
    pub fn to_string_display(&self) -> String {
        if self.width == 0 || self.height == 0 {
            return String::new();
        }

        self.rows()
            .map(|row| row.iter().map(|c| c.glyph).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(s: &str) -> Vec<Cell> {
        s.chars()
            .map(|glyph| Cell { glyph, color: None })
            .collect()
    }

    #[test]
    fn test_quantized_frame_rejects_wrong_cell_count() {
        assert!(QuantizedFrame::new(0, Duration::ZERO, 3, 2, glyphs("abcde")).is_none());
        assert!(QuantizedFrame::new(0, Duration::ZERO, 3, 2, glyphs("abcdef")).is_some());
    }

    #[test]
    fn test_quantized_frame_to_string_display() {
        let frame = QuantizedFrame::new(0, Duration::ZERO, 3, 2, glyphs("#.:@*+")).unwrap();
        assert_eq!(frame.to_string_display(), "#.:\n@*+");
    }

    #[test]
    fn test_quantized_frame_empty_display() {
        let frame = QuantizedFrame::new(0, Duration::ZERO, 0, 0, Vec::new()).unwrap();
        assert_eq!(frame.to_string_display(), "");
        assert_eq!(frame.rows().count(), 0);
    }

    #[test]
    fn test_has_color() {
        let mut cells = glyphs("ab");
        let plain = QuantizedFrame::new(0, Duration::ZERO, 2, 1, cells.clone()).unwrap();
        assert!(!plain.has_color());
        cells[1].color = Some(4);
        let colored = QuantizedFrame::new(0, Duration::ZERO, 2, 1, cells).unwrap();
        assert!(colored.has_color());
    }

    #[test]
    fn test_presentation_time() {
        assert_eq!(presentation_time(0, 30.0), Duration::ZERO);
        assert_eq!(presentation_time(30, 30.0), Duration::from_secs(1));
        assert_eq!(presentation_time(15, 30.0), Duration::from_millis(500));
        assert_eq!(presentation_time(10, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_raw_frame_expected_len() {
        let rgb = RawFrame::rgb(0, 30.0, 4, 2, vec![0; 24]);
        assert_eq!(rgb.expected_len(), 24);
        let luma = RawFrame::luma(0, 30.0, 4, 2, vec![0; 8]);
        assert_eq!(luma.expected_len(), 8);
    }

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::Rgb.channels(), 3);
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::Luma));
        assert_eq!(PixelFormat::from_channels(4), None);
    }
}
