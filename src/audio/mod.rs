//! Audio playback and the clock that paces video against it.
//!
//! [`AudioEngine`] is the seam to whatever actually plays the soundtrack.
//! [`AudioClock`] reads its position once per tick and falls back to the
//! wall clock when the engine cannot answer.

mod clock;
mod ffplay;

use std::path::Path;
use std::time::Duration;

pub use clock::{AudioClock, ManualClock, PlaybackClock};
pub use ffplay::{FfplayAudio, SilentAudio};

/// The audio engine cannot report a playback position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audio clock unavailable: {0}")]
pub struct ClockUnavailable(pub String);

/// Errors raised while starting audio playback.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio loaded")]
    NotLoaded,

    #[error("audio file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("ffplay not found. Install ffmpeg to get audio playback")]
    PlayerNotFound,

    #[error("failed to start audio player: {0}")]
    Spawn(#[from] std::io::Error),
}

/// External audio output with a play/stop/position API.
pub trait AudioEngine: Send {
    fn load(&mut self, path: &Path) -> Result<(), AudioError>;

    fn play(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self);

    /// Current playback position.
    fn position(&mut self) -> Result<Duration, ClockUnavailable>;

    fn is_playing(&mut self) -> bool;
}
