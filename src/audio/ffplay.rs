//! Audio engines backed by an `ffplay` child process, or by nothing at all.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{AudioEngine, AudioError, ClockUnavailable};

/// Plays the soundtrack through `ffplay -nodisp`.
///
/// ffplay exposes no position query, so the position is the time elapsed
/// since the process was started. Once the process exits the position
/// becomes unavailable and the clock falls back to wall time.
#[derive(Default)]
pub struct FfplayAudio {
    path: Option<PathBuf>,
    child: Option<Child>,
    started: Option<Instant>,
}

impl FfplayAudio {
    pub fn new() -> Self {
        Self::default()
    }

    fn child_running(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                log::info!("ffplay exited: {}", status);
                self.child = None;
                false
            }
            Some(Err(e)) => {
                log::warn!("Could not poll ffplay: {}", e);
                false
            }
            None => false,
        }
    }
}

impl AudioEngine for FfplayAudio {
    fn load(&mut self, path: &Path) -> Result<(), AudioError> {
        if !path.exists() {
            return Err(AudioError::NotFound(path.to_path_buf()));
        }
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let path = self.path.as_ref().ok_or(AudioError::NotLoaded)?;
        let child = Command::new("ffplay")
            .args(["-nodisp", "-autoexit", "-loglevel", "quiet"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    AudioError::PlayerNotFound
                } else {
                    AudioError::Spawn(e)
                }
            })?;

        log::info!("Started ffplay (pid {}) for {:?}", child.id(), path);
        self.child = Some(child);
        self.started = Some(Instant::now());
        Ok(())
    }

    /// SIGINT first so ffplay releases the audio device, then kill.
    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        #[cfg(unix)]
        {
            // SAFETY: signalling our own child process
            unsafe {
                libc::kill(child.id() as i32, libc::SIGINT);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.kill();
        }

        let start = Instant::now();
        let timeout = Duration::from_millis(500);
        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if start.elapsed() > timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break;
                }
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(_) => break,
            }
        }
        log::info!("Audio stopped");
    }

    fn position(&mut self) -> Result<Duration, ClockUnavailable> {
        if !self.child_running() {
            return Err(ClockUnavailable("ffplay is not running".to_string()));
        }
        self.started
            .map(|t| t.elapsed())
            .ok_or_else(|| ClockUnavailable("playback not started".to_string()))
    }

    fn is_playing(&mut self) -> bool {
        self.child_running()
    }
}

impl Drop for FfplayAudio {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Engine for muted sessions: never plays, never reports a position.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioEngine for SilentAudio {
    fn load(&mut self, _path: &Path) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn position(&mut self) -> Result<Duration, ClockUnavailable> {
        Err(ClockUnavailable("audio muted".to_string()))
    }

    fn is_playing(&mut self) -> bool {
        false
    }
}
