//! Glyph ramps for brightness quantization.
//!
//! Every ramp is ordered from sparse ink coverage to dense, so index 0 is
//! used for the darkest cells on a dark terminal.

/// Standard ASCII density ramp (10 levels).
pub const STANDARD_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// The historical 11-glyph player ramp.
pub const CLASSIC_RAMP: &[char] = &[' ', '.', '!', '*', '%', '$', '@', '&', '#', 'S', 'B'];

/// Fine-grained 70-glyph ramp.
pub const DETAILED_RAMP: &[char] = &[
    ' ', '.', '\'', '`', '^', '"', ',', ':', ';', 'I', 'l', '!', 'i', '>', '<', '~', '+', '_',
    '-', '?', ']', '[', '}', '{', '1', ')', '(', '|', '\\', '/', 't', 'f', 'j', 'r', 'x', 'n',
    'u', 'v', 'c', 'z', 'X', 'Y', 'U', 'J', 'C', 'L', 'Q', '0', 'O', 'Z', 'm', 'w', 'q', 'p',
    'd', 'b', 'k', 'h', 'a', 'o', '*', '#', 'M', 'W', '&', '8', '%', 'B', '@', '$',
];

/// Unicode block ramp (5 levels).
pub const BLOCKS_RAMP: &[char] = &[' ', '░', '▒', '▓', '█'];

/// Selectable glyph ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Standard,
    Classic,
    Detailed,
    Blocks,
}

impl Charset {
    /// Glyphs of this ramp, sparse to dense.
    pub fn glyphs(&self) -> &'static [char] {
        match self {
            Charset::Standard => STANDARD_RAMP,
            Charset::Classic => CLASSIC_RAMP,
            Charset::Detailed => DETAILED_RAMP,
            Charset::Blocks => BLOCKS_RAMP,
        }
    }

    /// Name used in the config file and the cache manifest.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Standard => "standard",
            Charset::Classic => "classic",
            Charset::Detailed => "detailed",
            Charset::Blocks => "blocks",
        }
    }

    /// Parse a ramp name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard" => Some(Charset::Standard),
            "classic" => Some(Charset::Classic),
            "detailed" => Some(Charset::Detailed),
            "blocks" => Some(Charset::Blocks),
            _ => None,
        }
    }
}
