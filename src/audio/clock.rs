//! Playback clocks.

use std::time::{Duration, Instant};

use super::AudioEngine;

/// Monotonic reference time the scheduler paces against.
pub trait PlaybackClock {
    /// Start counting. Calling it again has no effect.
    fn start(&mut self);

    /// Current position; never decreases between calls.
    fn position(&mut self) -> Duration;
}

/// Clock driven by an [`AudioEngine`], with a wall-clock fallback.
///
/// The first time the engine cannot report a position the clock switches
/// permanently to wall time elapsed since [`start`](PlaybackClock::start),
/// logging the switch once.
pub struct AudioClock {
    engine: Box<dyn AudioEngine>,
    started: Option<Instant>,
    fallback: Option<String>,
    last: Duration,
}

impl AudioClock {
    pub fn new(engine: Box<dyn AudioEngine>) -> Self {
        Self {
            engine,
            started: None,
            fallback: None,
            last: Duration::ZERO,
        }
    }

    /// Reason for falling back to the wall clock, if that happened.
    pub fn fell_back(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Stop the underlying engine.
    pub fn stop(&mut self) {
        self.engine.stop();
    }

    fn wall(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }
}

impl PlaybackClock for AudioClock {
    fn start(&mut self) {
        if self.started.is_some() {
            return;
        }
        self.started = Some(Instant::now());
        if let Err(e) = self.engine.play() {
            log::warn!("Audio did not start ({}), pacing by wall clock", e);
            self.fallback = Some(e.to_string());
        }
    }

    fn position(&mut self) -> Duration {
        let now = if self.fallback.is_some() {
            self.wall()
        } else {
            match self.engine.position() {
                Ok(pos) => pos,
                Err(e) => {
                    log::warn!("{}, pacing by wall clock", e);
                    self.fallback = Some(e.0);
                    self.wall()
                }
            }
        };

        self.last = self.last.max(now);
        self.last
    }
}

/// Clock whose position is set by hand. Used by tests and benchmarks.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    position: Duration,
    started: bool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, position: Duration) {
        self.position = position;
    }

    pub fn advance(&mut self, by: Duration) {
        self.position += by;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl PlaybackClock for ManualClock {
    fn start(&mut self) {
        self.started = true;
    }

    fn position(&mut self) -> Duration {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AudioError, ClockUnavailable, SilentAudio};
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Engine reporting a scripted sequence of positions.
    struct ScriptedAudio {
        positions: Arc<Mutex<Vec<Result<Duration, ClockUnavailable>>>>,
    }

    impl AudioEngine for ScriptedAudio {
        fn load(&mut self, _path: &Path) -> Result<(), AudioError> {
            Ok(())
        }

        fn play(&mut self) -> Result<(), AudioError> {
            Ok(())
        }

        fn stop(&mut self) {}

        fn position(&mut self) -> Result<Duration, ClockUnavailable> {
            let mut positions = self.positions.lock().unwrap();
            if positions.is_empty() {
                Err(ClockUnavailable("done".into()))
            } else {
                positions.remove(0)
            }
        }

        fn is_playing(&mut self) -> bool {
            true
        }
    }

    fn scripted(values: Vec<Result<Duration, ClockUnavailable>>) -> AudioClock {
        AudioClock::new(Box::new(ScriptedAudio {
            positions: Arc::new(Mutex::new(values)),
        }))
    }

    #[test]
    fn test_audio_clock_reports_engine_position() {
        let mut clock = scripted(vec![
            Ok(Duration::from_millis(100)),
            Ok(Duration::from_millis(250)),
        ]);
        clock.start();
        assert_eq!(clock.position(), Duration::from_millis(100));
        assert_eq!(clock.position(), Duration::from_millis(250));
        assert!(clock.fell_back().is_none());
    }

    #[test]
    fn test_audio_clock_never_goes_backwards() {
        let mut clock = scripted(vec![
            Ok(Duration::from_millis(500)),
            Ok(Duration::from_millis(200)),
        ]);
        clock.start();
        assert_eq!(clock.position(), Duration::from_millis(500));
        assert_eq!(clock.position(), Duration::from_millis(500));
    }

    #[test]
    fn test_audio_clock_falls_back_once() {
        let mut clock = scripted(vec![
            Ok(Duration::from_millis(10)),
            Err(ClockUnavailable("device gone".into())),
            Ok(Duration::from_secs(100)),
        ]);
        clock.start();
        assert_eq!(clock.position(), Duration::from_millis(10));

        let after = clock.position();
        assert!(after >= Duration::from_millis(10));
        assert_eq!(clock.fell_back(), Some("device gone"));

        // Engine is no longer consulted after the switch
        assert!(clock.position() < Duration::from_secs(100));
    }

    #[test]
    fn test_muted_clock_uses_wall_time() {
        let mut clock = AudioClock::new(Box::new(SilentAudio));
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        assert!(clock.position() >= Duration::from_millis(20));
        assert!(clock.fell_back().is_some());
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new();
        assert!(!clock.is_started());
        clock.start();
        clock.set(Duration::from_secs(2));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.position(), Duration::from_millis(2500));
        assert!(clock.is_started());
    }
}
