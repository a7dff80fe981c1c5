//! Unit tests for the glyph quantizer.
//!
//! These tests verify the properties the rest of the pipeline relies on:
//! - Determinism
//! - Grayscale monotonicity
//! - Palette selection and tie-breaking
//! - Rejection of malformed pixel data

use termcine::frame::RawFrame;
use termcine::glyph::{
    glyph_index, luminance, nearest, quantize, Charset, ColorMode, QuantizeError, QuantizeOptions,
    Quantizer, Rgb, ANSI_8, STANDARD_RAMP, XTERM_256,
};

fn gray(charset: Charset) -> QuantizeOptions {
    QuantizeOptions {
        charset,
        invert: false,
        color: ColorMode::Off,
    }
}

// ==================== Determinism Tests ====================

#[test]
fn test_quantize_is_deterministic() {
    let block = [12u8, 200, 77, 90, 91, 92, 255, 0, 128];
    let options = QuantizeOptions {
        charset: Charset::Detailed,
        invert: false,
        color: ColorMode::Ansi256,
    };
    let first = quantize(&block, 3, &options).unwrap();
    for _ in 0..100 {
        assert_eq!(quantize(&block, 3, &options).unwrap(), first);
    }
}

#[test]
fn test_quantize_is_deterministic_across_threads() {
    let options = QuantizeOptions {
        charset: Charset::Standard,
        invert: false,
        color: ColorMode::Ansi8,
    };
    let expected: Vec<_> = (0..=255u8)
        .map(|v| quantize(&[v, 255 - v, v / 2], 3, &options).unwrap())
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(move || {
                (0..=255u8)
                    .map(|v| quantize(&[v, 255 - v, v / 2], 3, &options).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

// ==================== Grayscale Monotonicity Tests ====================

#[test]
fn test_grayscale_monotonic_for_every_ramp() {
    for charset in [Charset::Standard, Charset::Classic, Charset::Detailed, Charset::Blocks] {
        let ramp = charset.glyphs();
        let options = gray(charset);
        let mut previous = 0;
        for v in 0..=255u8 {
            let cell = quantize(&[v], 1, &options).unwrap();
            let position = ramp.iter().position(|g| *g == cell.glyph).unwrap();
            assert!(
                position >= previous,
                "{} ramp went from {} to {} at brightness {}",
                charset.name(),
                previous,
                position,
                v
            );
            previous = position;
        }
        assert_eq!(previous, ramp.len() - 1);
    }
}

#[test]
fn test_glyph_index_formula() {
    assert_eq!(glyph_index(0, 10), 0);
    assert_eq!(glyph_index(25, 10), 0);
    assert_eq!(glyph_index(26, 10), 1);
    assert_eq!(glyph_index(128, 10), 5);
    assert_eq!(glyph_index(255, 10), 9);
    assert_eq!(glyph_index(255, 70), 69);
}

#[test]
fn test_extremes_map_to_ramp_ends() {
    let options = gray(Charset::Standard);
    assert_eq!(quantize(&[0, 0, 0], 3, &options).unwrap().glyph, STANDARD_RAMP[0]);
    assert_eq!(
        quantize(&[255, 255, 255], 3, &options).unwrap().glyph,
        STANDARD_RAMP[STANDARD_RAMP.len() - 1]
    );
}

#[test]
fn test_invert_flips_ramp() {
    let options = QuantizeOptions {
        invert: true,
        ..gray(Charset::Standard)
    };
    assert_eq!(quantize(&[0], 1, &options).unwrap().glyph, '@');
    assert_eq!(quantize(&[255], 1, &options).unwrap().glyph, ' ');
}

#[test]
fn test_luminance_weights() {
    assert_eq!(luminance(255, 255, 255), 255);
    assert_eq!(luminance(0, 0, 0), 0);
    // 299 * 255 / 1000 = 76.2
    assert_eq!(luminance(255, 0, 0), 76);
    // 587 * 255 / 1000 = 149.7
    assert_eq!(luminance(0, 255, 0), 149);
    // 114 * 255 / 1000 = 29.07
    assert_eq!(luminance(0, 0, 255), 29);
}

// ==================== Color Selection Tests ====================

#[test]
fn test_grayscale_has_no_color() {
    let cell = quantize(&[10, 20, 30], 3, &gray(Charset::Standard)).unwrap();
    assert_eq!(cell.color, None);
}

#[test]
fn test_color_exact_palette_hits() {
    for (i, entry) in ANSI_8.iter().enumerate() {
        assert_eq!(nearest(*entry, &ANSI_8) as usize, i);
    }
    // Cube corner 196 is pure red; index 9 (bright red) is the same color
    // and wins the tie as the lower index
    assert_eq!(XTERM_256[196], Rgb::new(255, 0, 0));
    assert_eq!(nearest(Rgb::new(255, 0, 0), &XTERM_256), 9);
}

#[test]
fn test_color_ties_go_to_lowest_index() {
    let palette = [Rgb::new(0, 0, 0), Rgb::new(10, 0, 0), Rgb::new(0, 10, 0)];
    // Equidistant from all three entries
    assert_eq!(nearest(Rgb::new(5, 5, 0), &palette), 0);
    assert_eq!(nearest(Rgb::new(10, 10, 0), &palette), 1);
}

#[test]
fn test_color_index_in_range() {
    let ansi8 = QuantizeOptions {
        charset: Charset::Standard,
        invert: false,
        color: ColorMode::Ansi8,
    };
    for v in (0..=255u8).step_by(15) {
        let cell = quantize(&[v, 255 - v, v], 3, &ansi8).unwrap();
        assert!(cell.color.unwrap() < 8);
    }
}

// ==================== Malformed Input Tests ====================

#[test]
fn test_unsupported_channel_count() {
    let options = gray(Charset::Standard);
    assert_eq!(
        quantize(&[1, 2, 3, 4], 4, &options),
        Err(QuantizeError::UnsupportedChannels(4))
    );
}

#[test]
fn test_frame_length_mismatch() {
    let quantizer = Quantizer::new(gray(Charset::Standard), 2, 2);
    let raw = RawFrame::rgb(0, 30.0, 2, 2, vec![0; 11]);
    assert_eq!(
        quantizer.quantize_frame(&raw),
        Err(QuantizeError::LengthMismatch {
            expected: 12,
            actual: 11
        })
    );
}

#[test]
fn test_frame_area_averaging() {
    // 4x2 luma frame onto a 2x1 grid: left half black, right half white
    let data = vec![0, 0, 255, 255, 0, 0, 255, 255];
    let raw = RawFrame::luma(7, 30.0, 4, 2, data);
    let quantizer = Quantizer::new(gray(Charset::Standard), 2, 1);
    let frame = quantizer.quantize_frame(&raw).unwrap();
    assert_eq!(frame.to_string_display(), " @");
    assert_eq!(frame.index(), 7);
}
