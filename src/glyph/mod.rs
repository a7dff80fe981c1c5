//! Glyph quantizer: turns pixel blocks into terminal cells.
//!
//! 1. **Luminance** - RGB to brightness using BT.601
//! 2. **Glyph mapping** - brightness onto an ordered ramp ([`Charset`])
//! 3. **Color selection** - nearest entry of the 8 or 256 color palette
//!
//! Everything here is a pure function of its inputs, so frames can be
//! quantized from several threads at once.

mod charset;
mod luminance;
mod palette;
mod quantize;

pub use charset::{Charset, BLOCKS_RAMP, CLASSIC_RAMP, DETAILED_RAMP, STANDARD_RAMP};
pub use luminance::luminance;
pub use palette::{nearest, ColorMode, Rgb, ANSI_8, XTERM_256};
pub use quantize::{glyph_index, quantize, quantize_color, QuantizeError, QuantizeOptions, Quantizer};
