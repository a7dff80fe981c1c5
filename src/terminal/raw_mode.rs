//! Scoped terminal setup with panic-safe cleanup.

use crossterm::cursor::{Hide, Show};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a guard currently owns the terminal (read by the panic hook).
pub(crate) static TERMINAL_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Owns the terminal for the length of a session.
///
/// Entering switches to raw mode and the alternate screen and hides the
/// cursor. Dropping the guard (or panicking while it is alive) restores all
/// three.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        install_panic_hook();

        enable_raw_mode()?;
        TERMINAL_ACTIVE.store(true, Ordering::SeqCst);
        let guard = Self { active: true };

        // On failure here the guard drops and undoes raw mode
        crossterm::execute!(io::stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        Ok(guard)
    }

    /// Restore the terminal now. Dropping the guard afterwards is a no-op.
    pub fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        TERMINAL_ACTIVE.store(false, Ordering::SeqCst);

        let mut stdout = io::stdout();
        let screen = crossterm::execute!(stdout, Show, LeaveAlternateScreen);
        let raw = disable_raw_mode();
        stdout.flush()?;
        screen?;
        raw
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Best effort, nothing useful to do with an error here
        let _ = self.restore();
    }
}

/// Restore the terminal before the default panic output is printed.
pub(crate) fn install_panic_hook() {
    static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        if TERMINAL_ACTIVE.swap(false, Ordering::SeqCst) {
            let _ = crossterm::execute!(io::stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }

        original_hook(panic_info);
    }));
}
