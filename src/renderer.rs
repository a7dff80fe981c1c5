//! Draws glyph frames, overlays and progress to the terminal.
//!
//! Every frame is written in full with absolute cursor moves, so whatever
//! was on screen before is overwritten without a clear (no flicker). The
//! whole frame is built in one buffer and written with a single call.

use std::fmt::Write as _;
use std::io::Write;

use crate::frame::QuantizedFrame;
use crate::glyph::ColorMode;
use crate::producer::Progress;

/// Width of the progress bar between the brackets.
pub const PROGRESS_BAR_LEN: usize = 50;

/// Writing to the terminal failed. Fatal for the session.
#[derive(Debug, thiserror::Error)]
#[error("terminal write failed: {0}")]
pub struct SurfaceError(#[from] pub std::io::Error);

/// Extra information drawn on top of a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay<'a> {
    /// Measured display rate, drawn top-right when set
    pub fps: Option<f64>,
    /// Production progress, drawn under the rate while frames are still coming
    pub buffered: Option<f64>,
    /// Caption text for the current position
    pub caption: Option<&'a str>,
}

/// Foreground color escape for a palette index.
pub fn color_escape(mode: ColorMode, index: u8) -> String {
    match mode {
        ColorMode::Ansi8 => format!("\x1b[3{}m", index.min(7)),
        ColorMode::Ansi256 => format!("\x1b[38;5;{}m", index),
        ColorMode::Off => String::new(),
    }
}

/// `[#####     ]` with `len` cells between the brackets.
pub fn progress_bar(fraction: f64, len: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * len as f64).round() as usize).min(len);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(len - filled))
}

/// Terminal renderer over any writer.
pub struct Renderer<W: Write> {
    out: W,
    color: ColorMode,
    buffer: String,
    caption_shown: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, color: ColorMode) -> Self {
        Self {
            out,
            color,
            buffer: String::new(),
            caption_shown: false,
        }
    }

    /// Draw `frame` at the top-left corner, then the overlay.
    pub fn render(&mut self, frame: &QuantizedFrame, overlay: &Overlay<'_>) -> Result<(), SurfaceError> {
        self.buffer.clear();
        let mut current: Option<u8> = None;

        for (row, cells) in frame.rows().enumerate() {
            let _ = write!(self.buffer, "\x1b[{};1H", row + 1);
            for cell in cells {
                if self.color.is_enabled() && cell.color != current {
                    match cell.color {
                        Some(index) => self.buffer.push_str(&color_escape(self.color, index)),
                        None => self.buffer.push_str("\x1b[39m"),
                    }
                    current = cell.color;
                }
                self.buffer.push(cell.glyph);
            }
        }
        self.buffer.push_str("\x1b[0m");

        if let Some(fps) = overlay.fps {
            let text = format!("FPS:{:.2}", fps);
            let col = (frame.width() as usize).saturating_sub(text.len()) + 1;
            let _ = write!(self.buffer, "\x1b[1;{}H\x1b[32m{}\x1b[0m", col, text);
        }
        if let Some(fraction) = overlay.buffered.filter(|f| *f < 1.0) {
            let text = format!("BUF:{:>3}%", (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32);
            let col = (frame.width() as usize).saturating_sub(text.len()) + 1;
            let _ = write!(self.buffer, "\x1b[2;{}H\x1b[32m{}\x1b[0m", col, text);
        }

        let caption_row = frame.height() as usize + 1;
        match overlay.caption {
            Some(text) if !text.is_empty() => {
                let width = frame.width() as usize;
                let text: String = text.chars().take(width.max(1)).collect();
                let col = width.saturating_sub(text.chars().count()) / 2 + 1;
                let _ = write!(self.buffer, "\x1b[{};1H\x1b[2K\x1b[{};{}H{}", caption_row, caption_row, col, text);
                self.caption_shown = true;
            }
            _ if self.caption_shown => {
                let _ = write!(self.buffer, "\x1b[{};1H\x1b[2K", caption_row);
                self.caption_shown = false;
            }
            _ => {}
        }

        self.flush_buffer()
    }

    /// Draw a centered progress line: label, bar and percentage.
    pub fn render_progress(&mut self, progress: &Progress, cols: u16, rows: u16) -> Result<(), SurfaceError> {
        let line = format!(
            "{} {} {:>3}%",
            progress.phase.label(),
            progress_bar(progress.fraction, PROGRESS_BAR_LEN),
            (progress.fraction * 100.0).round() as u32
        );
        self.render_message(&line, cols, rows)
    }

    /// Draw one line of text centered on the screen.
    pub fn render_message(&mut self, text: &str, cols: u16, rows: u16) -> Result<(), SurfaceError> {
        let row = rows / 2 + 1;
        let col = (cols as usize).saturating_sub(text.chars().count()) / 2 + 1;

        self.buffer.clear();
        let _ = write!(self.buffer, "\x1b[{};1H\x1b[2K\x1b[{};{}H{}", row, row, col, text);
        self.flush_buffer()
    }

    /// Blank the whole screen.
    pub fn clear(&mut self) -> Result<(), SurfaceError> {
        self.buffer.clear();
        self.buffer.push_str("\x1b[0m\x1b[2J\x1b[H");
        self.flush_buffer()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush_buffer(&mut self) -> Result<(), SurfaceError> {
        self.out.write_all(self.buffer.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
