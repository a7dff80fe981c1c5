//! Terminal surface: raw mode guard, size and non-blocking key input.

mod input;
mod raw_mode;

pub use input::{is_quit_key, poll_quit, start_key, wait_for_start, StartKey};
pub use raw_mode::TerminalGuard;

/// Current terminal size as `(cols, rows)`.
pub fn surface_size() -> std::io::Result<(u16, u16)> {
    crossterm::terminal::size()
}

/// Video grid for a terminal of `cols x rows`, keeping one row free for
/// captions when they are shown.
pub fn video_grid(cols: u16, rows: u16, captions: bool) -> (u16, u16) {
    let rows = if captions { rows.saturating_sub(1) } else { rows };
    (cols.max(1), rows.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_grid_reserves_caption_row() {
        assert_eq!(video_grid(80, 24, false), (80, 24));
        assert_eq!(video_grid(80, 24, true), (80, 23));
        assert_eq!(video_grid(0, 1, true), (1, 1));
    }
}
