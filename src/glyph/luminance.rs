//! RGB to brightness conversion using the ITU-R BT.601 luminance formula.

/// Luminance of one RGB sample.
///
/// Y = 0.299*R + 0.587*G + 0.114*B, computed with integer weights scaled by
/// 1000 (299 + 587 + 114 = 1000) so the result always fits in a byte.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let r = r as u32;
    let g = g as u32;
    let b = b as u32;
    ((299 * r + 587 * g + 114 * b) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_primaries() {
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 149);
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn test_luminance_extremes() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
    }

    #[test]
    fn test_luminance_gray_is_identity() {
        for v in [1u8, 17, 100, 128, 200, 254] {
            assert_eq!(luminance(v, v, v), v);
        }
    }
}
