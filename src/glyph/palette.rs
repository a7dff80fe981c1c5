//! Terminal color palettes and nearest-color selection.

/// An RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in RGB space.
    #[inline]
    pub fn distance_sq(&self, other: &Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// Color output mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Glyphs only
    #[default]
    Off,
    /// ANSI 8-color foreground (indices 0-7)
    Ansi8,
    /// xterm 256-color foreground (indices 0-255)
    Ansi256,
}

impl ColorMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ColorMode::Off)
    }

    /// The palette colors are chosen from, if any.
    pub fn palette(&self) -> Option<&'static [Rgb]> {
        match self {
            ColorMode::Off => None,
            ColorMode::Ansi8 => Some(&ANSI_8),
            ColorMode::Ansi256 => Some(&XTERM_256),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorMode::Off => "off",
            ColorMode::Ansi8 => "ansi8",
            ColorMode::Ansi256 => "ansi256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" | "none" => Some(ColorMode::Off),
            "ansi8" | "8" => Some(ColorMode::Ansi8),
            "ansi256" | "256" => Some(ColorMode::Ansi256),
            _ => None,
        }
    }
}

/// The eight basic ANSI colors as rendered by xterm.
pub const ANSI_8: [Rgb; 8] = [
    Rgb::new(0, 0, 0),
    Rgb::new(205, 0, 0),
    Rgb::new(0, 205, 0),
    Rgb::new(205, 205, 0),
    Rgb::new(0, 0, 238),
    Rgb::new(205, 0, 205),
    Rgb::new(0, 205, 205),
    Rgb::new(229, 229, 229),
];

const BRIGHT_8: [Rgb; 8] = [
    Rgb::new(127, 127, 127),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(92, 92, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 255),
];

/// Channel levels of the 6x6x6 color cube (indices 16-231).
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// The xterm 256-color palette: 16 system colors, the color cube, then a
/// 24-step gray ramp.
pub const XTERM_256: [Rgb; 256] = build_xterm_256();

const fn build_xterm_256() -> [Rgb; 256] {
    let mut palette = [Rgb::new(0, 0, 0); 256];

    let mut i = 0;
    while i < 8 {
        palette[i] = ANSI_8[i];
        palette[i + 8] = BRIGHT_8[i];
        i += 1;
    }

    let mut n = 0;
    while n < 216 {
        palette[16 + n] = Rgb::new(
            CUBE_LEVELS[n / 36],
            CUBE_LEVELS[(n / 6) % 6],
            CUBE_LEVELS[n % 6],
        );
        n += 1;
    }

    let mut g = 0;
    while g < 24 {
        let v = (8 + g * 10) as u8;
        palette[232 + g] = Rgb::new(v, v, v);
        g += 1;
    }

    palette
}

/// Index of the palette entry closest to `color`.
///
/// Ties resolve to the lowest index: entries are scanned in order and only a
/// strictly smaller distance replaces the current best.
pub fn nearest(color: Rgb, palette: &[Rgb]) -> u8 {
    let mut best = 0usize;
    let mut best_distance = u32::MAX;

    for (i, entry) in palette.iter().enumerate() {
        let d = color.distance_sq(entry);
        if d < best_distance {
            best = i;
            best_distance = d;
            if d == 0 {
                break;
            }
        }
    }

    best as u8
}
