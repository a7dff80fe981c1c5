//! A playback session: acquisition, production, paced playback, teardown.
//!
//! The session owns every resource and the stop flag. Teardown always runs
//! in the same order: scheduler, producer, audio, terminal.

use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::audio::{AudioClock, AudioEngine, FfplayAudio, SilentAudio};
use crate::captions::{sidecar_path, Captions};
use crate::config::{CacheMode, InputSource, PlayerConfig};
use crate::error::SessionError;
use crate::glyph::{QuantizeOptions, Quantizer};
use crate::producer::{Decimation, FrameProducer, ProductionReport, Progress, ProgressPhase};
use crate::renderer::{Overlay, Renderer, SurfaceError};
use crate::scheduler::{Scheduler, SchedulerStats, Tick};
use crate::source::{probe, DownloadError, Downloader, FfmpegSource, SourceError};
use crate::store::{CacheDir, CacheKey, DiskStore, FrameStore, MemoryStore, StoreError};
use crate::terminal::{poll_quit, surface_size, video_grid, wait_for_start, StartKey, TerminalGuard};

/// Install a Ctrl+C handler that raises `stop`.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler(stop: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
        log::info!("Received Ctrl+C, shutting down");
    })
}

/// What happened during a session, printed once the terminal is restored.
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub production: Option<ProductionReport>,
    pub scheduler: SchedulerStats,
    /// Why the audio clock was abandoned for the wall clock
    pub clock_fallback: Option<String>,
    pub stopped_by_user: bool,
    /// Recoverable problems worth telling the user about
    pub diagnostics: Vec<String>,
}

impl SessionSummary {
    /// Lines to print on stderr after playback.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = self.diagnostics.clone();
        if let Some(reason) = &self.clock_fallback {
            lines.push(format!("Audio clock unavailable ({}), video was paced by wall clock", reason));
        }
        if let Some(report) = &self.production {
            if report.read_error.is_some() || report.dropped > 0 || report.shortfall().is_some() {
                lines.push(format!("Video: {}", report));
            }
        }
        lines
    }
}

/// Frames ready for playback, plus the incremental producer if one runs.
struct Prepared {
    store: Arc<dyn FrameStore>,
    producer: Option<JoinHandle<ProductionReport>>,
    progress: Option<Receiver<Progress>>,
}

/// Text of the start prompt.
const START_PROMPT: &str = "Press any key to start (q to quit)";

pub struct Session {
    player: PlayerConfig,
    stop: Arc<AtomicBool>,
    summary: SessionSummary,
}

impl Session {
    pub fn new(player: PlayerConfig, stop: Arc<AtomicBool>) -> Self {
        Self {
            player,
            stop,
            summary: SessionSummary::default(),
        }
    }

    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        log::info!("Session settings: {}", self.player.describe());

        let video = self.acquire()?;
        let captions = self.load_captions(&video);
        let info = probe(&video)?;

        // Declared first so it is dropped last
        let mut guard = TerminalGuard::enter().map_err(SurfaceError::from)?;
        let (cols, rows) = surface_size().map_err(SurfaceError::from)?;
        let (width, height) = video_grid(cols, rows, captions.is_some());
        log::info!("Terminal {}x{}, video grid {}x{}", cols, rows, width, height);

        let decimation = Decimation::new(info.fps, self.player.target_fps);
        if decimation.stride() > 1 {
            log::info!(
                "Keeping every {} frames ({:.3} -> {:.3} fps)",
                decimation.stride(),
                info.fps,
                decimation.display_fps()
            );
        }
        let quantizer = Quantizer::new(
            QuantizeOptions {
                charset: self.player.charset,
                invert: self.player.invert,
                color: self.player.color,
            },
            width,
            height,
        );
        let key = CacheKey {
            width,
            height,
            color: self.player.color,
            charset: self.player.charset,
            invert: self.player.invert,
            stride: decimation.stride(),
        };
        let producer = FrameProducer::new(quantizer, decimation, self.stop.clone());
        let mut renderer = Renderer::new(io::stdout(), self.player.color);
        renderer.clear()?;

        let prepared = self.prepare(&video, producer, key, &mut renderer, (cols, rows));
        let prepared = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                guard.restore().map_err(SurfaceError::from)?;
                return Ok(self.summary);
            }
            Err(e) => {
                let _ = guard.restore();
                return Err(e);
            }
        };

        let played = match self.await_start(&mut renderer, (cols, rows)) {
            Ok(true) => self
                .play(
                    &video,
                    prepared.store,
                    prepared.progress,
                    decimation,
                    captions.as_ref(),
                    &mut renderer,
                )
                .map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };

        // Scheduler is done; stop the producer, then audio, then the terminal
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = prepared.producer {
            match handle.join() {
                Ok(report) => self.summary.production = Some(report),
                Err(_) => self.summary.diagnostics.push("Frame producer panicked".to_string()),
            }
        }
        let played = played.map(|clock| {
            if let Some(mut clock) = clock {
                self.summary.clock_fallback = clock.fell_back().map(str::to_string);
                clock.stop();
            }
        });
        let restored = guard.restore();

        played?;
        restored.map_err(SurfaceError::from)?;
        Ok(self.summary)
    }

    /// Local path of the video, downloading remote sources first.
    fn acquire(&self) -> Result<PathBuf, SessionError> {
        match &self.player.input {
            InputSource::Local(path) => {
                if !path.exists() {
                    return Err(SourceError::NotFound(path.clone()).into());
                }
                Ok(path.clone())
            }
            InputSource::Remote(url) => {
                let dest_dir = self.player.cache_root.join("downloads");
                eprintln!("Downloading {} ...", url);
                let runtime = tokio::runtime::Runtime::new().map_err(SessionError::Runtime)?;
                let path = runtime.block_on(async {
                    let downloader = Downloader::new()?;
                    Ok::<_, DownloadError>(downloader.fetch(url, &dest_dir).await?)
                })?;
                Ok(path)
            }
        }
    }

    fn load_captions(&mut self, video: &Path) -> Option<Captions> {
        let request = self.player.subtitles.as_ref()?;
        let lang = request.lang.as_deref();
        let Some(path) = sidecar_path(video, lang) else {
            self.summary
                .diagnostics
                .push(format!("No subtitles found next to {}", video.display()));
            return None;
        };
        match Captions::load(&path) {
            Ok(captions) => Some(captions),
            Err(e) => {
                log::warn!("{}", e);
                self.summary.diagnostics.push(e.to_string());
                None
            }
        }
    }

    /// Fill a store according to the cache mode.
    ///
    /// `Ok(None)` means the user stopped during production.
    fn prepare(
        &mut self,
        video: &Path,
        producer: FrameProducer,
        key: CacheKey,
        renderer: &mut Renderer<Stdout>,
        size: (u16, u16),
    ) -> Result<Option<Prepared>, SessionError> {
        let dir = CacheDir::for_source(&self.player.cache_root, &self.player.input.cache_identity());

        match self.player.cache_mode {
            CacheMode::None => {
                let source = FfmpegSource::open(video, key.width, key.height)?;
                let store = Arc::new(MemoryStore::new());
                let (tx, rx) = mpsc::channel();
                let handle = producer.spawn(Box::new(source), store.clone(), tx);
                Ok(Some(Prepared {
                    store,
                    producer: Some(handle),
                    progress: Some(rx),
                }))
            }
            CacheMode::Read => {
                let opened = DiskStore::open(dir.clone(), key).and_then(|disk| {
                    let frames = disk.check()?.frame_count;
                    Ok((disk, frames))
                });
                match opened {
                    Ok((disk, frames)) => {
                        log::info!("Using cache {:?} ({} frames)", dir.root(), frames);
                        self.preload(&disk, renderer, size)
                    }
                    Err(e) => {
                        let message = match &e {
                            StoreError::ManifestMissing => {
                                format!("No frame cache in {}, extracting", dir.root().display())
                            }
                            other => format!("Frame cache not usable ({}), extracting again", other),
                        };
                        log::warn!("{}", message);
                        self.summary.diagnostics.push(message);
                        self.write_cache(video, producer, dir, key, renderer, size)
                    }
                }
            }
            CacheMode::Write => self.write_cache(video, producer, dir, key, renderer, size),
        }
    }

    fn write_cache(
        &mut self,
        video: &Path,
        producer: FrameProducer,
        dir: CacheDir,
        key: CacheKey,
        renderer: &mut Renderer<Stdout>,
        size: (u16, u16),
    ) -> Result<Option<Prepared>, SessionError> {
        let mut source = FfmpegSource::open(video, key.width, key.height)?;
        let disk = DiskStore::create(dir, key, producer.decimation().source_fps())?;

        let stop = self.stop.clone();
        let mut surface_error = None;
        let report = producer.run_pre_extract(&mut source, &disk, &mut |progress| {
            show_progress(renderer, &progress, size, &stop, &mut surface_error);
        })?;
        drop(source);

        if let Some(e) = surface_error {
            return Err(e.into());
        }
        let cancelled = report.cancelled;
        self.summary.production = Some(report);
        if cancelled {
            self.summary.stopped_by_user = true;
            return Ok(None);
        }

        self.preload(&disk, renderer, size)
    }

    /// Copy a complete disk cache into memory for playback.
    fn preload(
        &mut self,
        disk: &DiskStore,
        renderer: &mut Renderer<Stdout>,
        size: (u16, u16),
    ) -> Result<Option<Prepared>, SessionError> {
        let store = Arc::new(MemoryStore::new());
        let stop = self.stop.clone();
        let mut surface_error = None;
        let loaded = disk.preload_into(&*store, &mut |fraction| {
            let progress = Progress {
                phase: ProgressPhase::Loading,
                fraction,
            };
            show_progress(renderer, &progress, size, &stop, &mut surface_error);
        })?;

        if let Some(e) = surface_error {
            return Err(e.into());
        }
        log::info!("Loaded {} cached frames", loaded);
        renderer.clear()?;

        Ok(Some(Prepared {
            store,
            producer: None,
            progress: None,
        }))
    }

    /// Show the start prompt unless disabled. `Ok(false)` means the user
    /// chose to quit.
    fn await_start(
        &mut self,
        renderer: &mut Renderer<Stdout>,
        (cols, rows): (u16, u16),
    ) -> Result<bool, SessionError> {
        if !self.player.wait_for_key {
            return Ok(true);
        }
        renderer.render_message(START_PROMPT, cols, rows)?;
        let answer = wait_for_start(&self.stop).map_err(SurfaceError::from)?;
        renderer.clear()?;

        if answer == StartKey::Quit {
            self.summary.stopped_by_user = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Tick until the scheduler finishes or the user stops. Returns the
    /// clock so the caller decides when audio stops.
    fn play(
        &mut self,
        video: &Path,
        store: Arc<dyn FrameStore>,
        progress: Option<Receiver<Progress>>,
        decimation: Decimation,
        captions: Option<&Captions>,
        renderer: &mut Renderer<Stdout>,
    ) -> Result<AudioClock, SessionError> {
        let mut clock = AudioClock::new(self.audio_engine(video));
        let mut scheduler = Scheduler::new(store, decimation, self.player.skip_enabled);
        let period = scheduler.period();
        let mut deadline = Instant::now();
        let mut buffered = None;

        let result = loop {
            if self.stop.load(Ordering::SeqCst) {
                self.summary.stopped_by_user = true;
                break Ok(());
            }
            match poll_quit() {
                Ok(true) => {
                    self.summary.stopped_by_user = true;
                    break Ok(());
                }
                Ok(false) => {}
                Err(e) => break Err(SurfaceError::from(e)),
            }

            if let Some(rx) = &progress {
                if let Some(latest) = rx.try_iter().last() {
                    buffered = Some(latest.fraction);
                }
            }

            let now = Instant::now();
            let tick = scheduler.tick(&mut clock, now);
            if matches!(tick, Tick::Finished) {
                break Ok(());
            }

            if let Some(frame) = tick.frame() {
                let overlay = Overlay {
                    fps: self
                        .player
                        .debug_overlay
                        .then(|| scheduler.state().fps_estimate),
                    buffered: buffered.filter(|_| self.player.debug_overlay),
                    caption: captions.and_then(|c| c.at(frame.timestamp())),
                };
                if let Err(e) = renderer.render(frame, &overlay) {
                    break Err(e);
                }
            }

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else if now - deadline > period {
                // Too far behind to catch up by not sleeping; resync
                deadline = now;
            }
        };

        let stats = scheduler.stats();
        log::info!(
            "Playback ended: {} rendered, {} repeated, {} skipped, {} back-pressure holds",
            stats.rendered,
            stats.repeated,
            stats.skipped,
            stats.back_pressure
        );
        self.summary.scheduler = stats;

        match result {
            Ok(()) => Ok(clock),
            Err(e) => {
                clock.stop();
                Err(e.into())
            }
        }
    }

    fn audio_engine(&mut self, video: &Path) -> Box<dyn AudioEngine> {
        if self.player.mute {
            return Box::new(SilentAudio);
        }
        let mut audio = FfplayAudio::new();
        match audio.load(video) {
            Ok(()) => Box::new(audio),
            Err(e) => {
                log::warn!("Playing without audio: {}", e);
                self.summary.diagnostics.push(format!("Playing without audio: {}", e));
                Box::new(SilentAudio)
            }
        }
    }
}

/// Draw progress and check for stop keys. Production has no other chance to
/// see input, so this is where a cancel during extraction is noticed.
fn show_progress(
    renderer: &mut Renderer<Stdout>,
    progress: &Progress,
    (cols, rows): (u16, u16),
    stop: &AtomicBool,
    surface_error: &mut Option<SurfaceError>,
) {
    if surface_error.is_some() {
        return;
    }
    if matches!(poll_quit(), Ok(true)) {
        stop.store(true, Ordering::SeqCst);
    }
    if let Err(e) = renderer.render_progress(progress, cols, rows) {
        stop.store(true, Ordering::SeqCst);
        *surface_error = Some(e);
    }
}
