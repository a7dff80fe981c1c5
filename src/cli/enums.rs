//! CLI enum types for color mode and glyph ramp options.

use clap::ValueEnum;

use crate::glyph::{Charset, ColorMode};

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Off,
    Ansi8,
    Ansi256,
}

impl From<ColorChoice> for ColorMode {
    fn from(c: ColorChoice) -> Self {
        match c {
            ColorChoice::Off => ColorMode::Off,
            ColorChoice::Ansi8 => ColorMode::Ansi8,
            ColorChoice::Ansi256 => ColorMode::Ansi256,
        }
    }
}

/// Glyph ramp, sparse to dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CharacterSet {
    #[default]
    Standard,
    Classic,
    Detailed,
    Blocks,
}

impl From<CharacterSet> for Charset {
    fn from(c: CharacterSet) -> Self {
        match c {
            CharacterSet::Standard => Charset::Standard,
            CharacterSet::Classic => Charset::Classic,
            CharacterSet::Detailed => Charset::Detailed,
            CharacterSet::Blocks => Charset::Blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_choice_to_color_mode() {
        assert_eq!(ColorMode::from(ColorChoice::Off), ColorMode::Off);
        assert_eq!(ColorMode::from(ColorChoice::Ansi8), ColorMode::Ansi8);
        assert_eq!(ColorMode::from(ColorChoice::Ansi256), ColorMode::Ansi256);
    }

    #[test]
    fn test_charset_to_glyph_charset() {
        assert_eq!(Charset::from(CharacterSet::Standard), Charset::Standard);
        assert_eq!(Charset::from(CharacterSet::Classic), Charset::Classic);
        assert_eq!(Charset::from(CharacterSet::Detailed), Charset::Detailed);
        assert_eq!(Charset::from(CharacterSet::Blocks), Charset::Blocks);
    }

    #[test]
    fn test_value_names_match_config_names() {
        for choice in ColorChoice::value_variants() {
            let name = choice.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(ColorMode::from_name(&name), Some(ColorMode::from(*choice)));
        }
        for choice in CharacterSet::value_variants() {
            let name = choice.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(Charset::from_name(&name), Some(Charset::from(*choice)));
        }
    }
}
