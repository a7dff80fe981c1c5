//! Stop keys and the start prompt.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the start prompt rechecks the stop flag.
const PROMPT_POLL: Duration = Duration::from_millis(100);

/// Answer to the start prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKey {
    Start,
    Quit,
}

/// `q`, `Esc` or Ctrl+C (raw mode swallows SIGINT, so it arrives as a key).
pub fn is_quit_key(event: &KeyEvent) -> bool {
    if event.kind == KeyEventKind::Release {
        return false;
    }
    match event.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => event.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Drain pending input without blocking; `true` if a stop key was pressed.
pub fn poll_quit() -> io::Result<bool> {
    let mut quit = false;
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            quit |= is_quit_key(&key);
        }
    }
    Ok(quit)
}

/// Any key starts playback, except the stop keys.
pub fn start_key(event: &KeyEvent) -> Option<StartKey> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    if is_quit_key(event) {
        Some(StartKey::Quit)
    } else {
        Some(StartKey::Start)
    }
}

/// Block until a key is pressed or `stop` is raised.
pub fn wait_for_start(stop: &AtomicBool) -> io::Result<StartKey> {
    if stop.load(Ordering::SeqCst) {
        return Ok(StartKey::Quit);
    }
    // Keys typed while frames were being prepared do not count
    while event::poll(Duration::ZERO)? {
        event::read()?;
    }

    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(StartKey::Quit);
        }
        if event::poll(PROMPT_POLL)? {
            if let Event::Key(key) = event::read()? {
                if let Some(answer) = start_key(&key) {
                    return Ok(answer);
                }
            }
        }
    }
}
