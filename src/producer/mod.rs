//! Frame producer: pulls raw frames from a source, decimates, quantizes and
//! fills a frame store.
//!
//! Two modes:
//! - **incremental** ([`FrameProducer::run_incremental`], [`FrameProducer::spawn`]):
//!   one pass on a background thread while playback consumes
//! - **pre-extract** ([`FrameProducer::run_pre_extract`]): raw frames to disk,
//!   then parallel quantization into a [`DiskStore`], before playback
//!
//! [`DiskStore`]: crate::store::DiskStore

mod decimation;
mod extract;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::glyph::Quantizer;
use crate::source::VideoSource;
use crate::store::FrameStore;

pub use decimation::Decimation;

/// Source frames between two progress reports.
const PROGRESS_EVERY: u64 = 16;

/// Stage a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Extraction,
    Quantization,
    Loading,
}

impl ProgressPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressPhase::Extraction => "Extracting frames",
            ProgressPhase::Quantization => "Converting frames",
            ProgressPhase::Loading => "Loading cache",
        }
    }
}

/// Production progress, `fraction` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub phase: ProgressPhase,
    pub fraction: f64,
}

impl Progress {
    pub fn new(phase: ProgressPhase, done: u64, total: Option<u64>) -> Self {
        let fraction = match total {
            Some(total) if total > 0 => (done as f64 / total as f64).clamp(0.0, 1.0),
            _ => 0.0,
        };
        Self { phase, fraction }
    }
}

/// What a production run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionReport {
    /// Source frames kept by decimation
    pub kept: u64,
    /// Frames that made it into the store
    pub stored: u64,
    /// Kept frames dropped because quantizing or storing failed
    pub dropped: u64,
    /// Source frames discarded by decimation
    pub discarded: u64,
    /// Kept frames expected from the source's frame count, when known
    pub expected: Option<u64>,
    /// Read error that ended production early
    pub read_error: Option<String>,
    pub cancelled: bool,
}

impl ProductionReport {
    /// Frames that were expected but never stored.
    pub fn shortfall(&self) -> Option<u64> {
        self.expected
            .map(|expected| expected.saturating_sub(self.stored))
            .filter(|missing| *missing > 0)
    }

    fn log_summary(&self) {
        log::info!(
            "Production finished: {} stored, {} dropped, {} discarded by decimation",
            self.stored,
            self.dropped,
            self.discarded
        );
        if let Some(e) = &self.read_error {
            log::warn!("Source read failed, production ended early: {}", e);
        }
        if let Some(missing) = self.shortfall() {
            log::warn!(
                "Stored {} of {} expected frames ({} short)",
                self.stored,
                self.expected.unwrap_or_default(),
                missing
            );
        }
    }
}

impl fmt::Display for ProductionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames stored", self.stored)?;
        if let Some(expected) = self.expected {
            write!(f, " of {}", expected)?;
        }
        if self.dropped > 0 {
            write!(f, ", {} dropped", self.dropped)?;
        }
        if let Some(e) = &self.read_error {
            write!(f, ", source ended early ({})", e)?;
        }
        Ok(())
    }
}

/// Turns a video source into stored glyph frames.
#[derive(Clone)]
pub struct FrameProducer {
    quantizer: Quantizer,
    decimation: Decimation,
    stop: Arc<AtomicBool>,
}

impl FrameProducer {
    pub fn new(quantizer: Quantizer, decimation: Decimation, stop: Arc<AtomicBool>) -> Self {
        Self {
            quantizer,
            decimation,
            stop,
        }
    }

    pub fn decimation(&self) -> &Decimation {
        &self.decimation
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Single pass from `source` into `store`. Frames are visible to readers
    /// as soon as they are stored.
    ///
    /// Progress is reported in one phase, ending at 1.0. The store is marked
    /// complete however the run ends.
    pub fn run_incremental(
        &self,
        source: &mut dyn VideoSource,
        store: &dyn FrameStore,
        progress: &mut dyn FnMut(Progress),
    ) -> ProductionReport {
        let total = source.info().frame_count;
        let mut report = ProductionReport {
            expected: total.map(|n| self.decimation.kept_of(n)),
            ..Default::default()
        };

        let mut index = 0u64;
        progress(Progress::new(ProgressPhase::Extraction, 0, total));
        loop {
            if self.stopped() {
                report.cancelled = true;
                break;
            }
            if index > 0 && index % PROGRESS_EVERY == 0 {
                progress(Progress::new(ProgressPhase::Extraction, index, total));
            }

            if !self.decimation.keeps(index) {
                match source.skip_frame() {
                    Ok(true) => {
                        report.discarded += 1;
                        index += 1;
                        continue;
                    }
                    Ok(false) => break,
                    Err(e) => {
                        report.read_error = Some(e.to_string());
                        break;
                    }
                }
            }

            let raw = match source.next_frame() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    report.read_error = Some(e.to_string());
                    break;
                }
            };
            index += 1;
            report.kept += 1;

            let stored = self
                .quantizer
                .quantize_frame(&raw)
                .map_err(|e| e.to_string())
                .and_then(|frame| store.put(raw.index, frame).map_err(|e| e.to_string()));
            match stored {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    log::warn!("Dropping frame {}: {}", raw.index, e);
                    report.dropped += 1;
                }
            }
        }

        store.mark_complete();
        progress(Progress::new(ProgressPhase::Extraction, 1, Some(1)));
        report.log_summary();
        report
    }

    /// Run [`run_incremental`](Self::run_incremental) on its own thread,
    /// sending progress to `progress`.
    pub fn spawn<S>(
        self,
        mut source: Box<dyn VideoSource>,
        store: S,
        progress: Sender<Progress>,
    ) -> JoinHandle<ProductionReport>
    where
        S: FrameStore + 'static,
    {
        thread::spawn(move || {
            // The receiver may be gone once playback has ended
            let mut send = |p: Progress| {
                let _ = progress.send(p);
            };
            self.run_incremental(source.as_mut(), &store, &mut send)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::glyph::{Charset, ColorMode, QuantizeOptions};
    use crate::source::{SourceError, SourceInfo};
    use crate::store::MemoryStore;

    struct Ramp {
        info: SourceInfo,
        next: u64,
        total: u64,
    }

    impl VideoSource for Ramp {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
            if self.next >= self.total {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            let value = (index * 10 % 256) as u8;
            Ok(Some(RawFrame::luma(index, self.info.fps, 2, 2, vec![value; 4])))
        }
    }

    fn producer(target: Option<u32>) -> FrameProducer {
        let options = QuantizeOptions {
            charset: Charset::Standard,
            invert: false,
            color: ColorMode::Off,
        };
        FrameProducer::new(
            Quantizer::new(options, 2, 2),
            Decimation::new(30.0, target),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn ramp(total: u64) -> Ramp {
        Ramp {
            info: SourceInfo {
                fps: 30.0,
                frame_count: Some(total),
                width: 2,
                height: 2,
            },
            next: 0,
            total,
        }
    }

    #[test]
    fn test_incremental_stores_every_frame() {
        let store = MemoryStore::new();
        let report = producer(None).run_incremental(&mut ramp(5), &store, &mut |_| {});
        assert_eq!(report.stored, 5);
        assert_eq!(report.shortfall(), None);
        assert_eq!(store.count(), 5);
        assert!(store.is_complete());
    }

    #[test]
    fn test_incremental_honors_stop_flag() {
        let store = MemoryStore::new();
        let p = producer(None);
        p.stop.store(true, Ordering::SeqCst);
        let report = p.run_incremental(&mut ramp(5), &store, &mut |_| {});
        assert!(report.cancelled);
        assert_eq!(store.count(), 0);
        assert!(store.is_complete());
    }

    #[test]
    fn test_incremental_reports_progress() {
        let store = MemoryStore::new();
        let mut updates = Vec::new();
        producer(Some(10)).run_incremental(&mut ramp(60), &store, &mut |p| updates.push(p));

        assert!(updates.iter().all(|p| p.phase == ProgressPhase::Extraction));
        assert_eq!(updates.first().map(|p| p.fraction), Some(0.0));
        assert_eq!(updates.last().map(|p| p.fraction), Some(1.0));
        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        // 0, 16, 32, 48, then the end
        assert_eq!(updates.len(), 5);
    }

    #[test]
    fn test_progress_fraction() {
        let p = Progress::new(ProgressPhase::Extraction, 5, Some(10));
        assert_eq!(p.fraction, 0.5);
        assert_eq!(Progress::new(ProgressPhase::Loading, 5, None).fraction, 0.0);
        assert_eq!(Progress::new(ProgressPhase::Loading, 20, Some(10)).fraction, 1.0);
    }

    #[test]
    fn test_report_display() {
        let report = ProductionReport {
            stored: 8,
            expected: Some(10),
            dropped: 1,
            ..Default::default()
        };
        assert_eq!(report.to_string(), "8 frames stored of 10, 1 dropped");
        assert_eq!(report.shortfall(), Some(2));
    }
}
