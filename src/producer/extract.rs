//! Pre-extract production for cache write mode.

use image::{GrayImage, ImageFormat, RgbImage};
use rayon::prelude::*;
use std::path::Path;

use super::{FrameProducer, Progress, ProgressPhase, ProductionReport, PROGRESS_EVERY};
use crate::frame::{PixelFormat, RawFrame};
use crate::source::VideoSource;
use crate::store::{DiskStore, FrameStore, StoreError};

/// Frames quantized per parallel batch; progress is reported between batches.
const QUANTIZE_BATCH: usize = 64;

impl FrameProducer {
    /// Extract every kept frame to `frames/`, then quantize them in parallel
    /// into `store`, then write the manifest.
    ///
    /// Returns early without a manifest when the stop flag is raised, so a
    /// cancelled run is never mistaken for a usable cache. The store is
    /// marked complete either way.
    pub fn run_pre_extract(
        &self,
        source: &mut dyn VideoSource,
        store: &DiskStore,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<ProductionReport, StoreError> {
        let result = self.pre_extract(source, store, progress);
        store.mark_complete();
        result
    }

    fn pre_extract(
        &self,
        source: &mut dyn VideoSource,
        store: &DiskStore,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<ProductionReport, StoreError> {
        let total = source.info().frame_count;
        let mut report = ProductionReport {
            expected: total.map(|n| self.decimation.kept_of(n)),
            ..Default::default()
        };

        // Phase 1: extraction
        let mut extracted = Vec::new();
        let mut index = 0u64;
        progress(Progress::new(ProgressPhase::Extraction, 0, total));
        loop {
            if self.stopped() {
                report.cancelled = true;
                return Ok(report);
            }

            let step = if self.decimation.keeps(index) {
                source.next_frame().map(|frame| match frame {
                    Some(raw) => Step::Kept(raw),
                    None => Step::End,
                })
            } else {
                source
                    .skip_frame()
                    .map(|more| if more { Step::Discarded } else { Step::End })
            };

            match step {
                Ok(Step::Kept(raw)) => {
                    report.kept += 1;
                    match check_raw(&raw) {
                        Ok(()) => {
                            save_raw(&raw, &store.dir().raw_frame_path(raw.index))?;
                            extracted.push(raw.index);
                        }
                        Err(reason) => {
                            log::warn!("Dropping frame {}: {}", raw.index, reason);
                            report.dropped += 1;
                        }
                    }
                }
                Ok(Step::Discarded) => report.discarded += 1,
                Ok(Step::End) => break,
                Err(e) => {
                    report.read_error = Some(e.to_string());
                    break;
                }
            }
            index += 1;
            if index % PROGRESS_EVERY == 0 {
                progress(Progress::new(ProgressPhase::Extraction, index, total));
            }
        }
        progress(Progress::new(ProgressPhase::Extraction, 1, Some(1)));
        log::info!(
            "Extracted {} frames to {:?}",
            extracted.len(),
            store.dir().frames_dir()
        );

        // Phase 2: quantization
        let fps = self.decimation.source_fps();
        let quantized_total = Some(extracted.len() as u64);
        let mut done = 0u64;
        progress(Progress::new(ProgressPhase::Quantization, 0, quantized_total));
        for batch in extracted.chunks(QUANTIZE_BATCH) {
            if self.stopped() {
                report.cancelled = true;
                return Ok(report);
            }

            let outcomes: Vec<Result<(), String>> = batch
                .par_iter()
                .map(|&idx| {
                    let raw = load_raw(&store.dir().raw_frame_path(idx), idx, fps)
                        .map_err(|e| e.to_string())?;
                    let frame = self
                        .quantizer
                        .quantize_frame(&raw)
                        .map_err(|e| e.to_string())?;
                    store.put(idx, frame).map_err(|e| e.to_string())
                })
                .collect();

            for (idx, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(()) => report.stored += 1,
                    Err(e) => {
                        log::warn!("Dropping frame {}: {}", idx, e);
                        report.dropped += 1;
                    }
                }
            }

            done += batch.len() as u64;
            progress(Progress::new(ProgressPhase::Quantization, done, quantized_total));
        }

        store.finalize()?;
        report.log_summary();
        Ok(report)
    }
}

enum Step {
    Kept(RawFrame),
    Discarded,
    End,
}

/// Reject frames the quantizer would reject, before they reach the disk.
fn check_raw(raw: &RawFrame) -> Result<(), String> {
    if PixelFormat::from_channels(raw.channels).is_none() {
        return Err(format!("unsupported channel count {}", raw.channels));
    }
    if raw.data.len() != raw.expected_len() {
        return Err(format!(
            "{} bytes for a {}x{}x{} frame",
            raw.data.len(),
            raw.width,
            raw.height,
            raw.channels
        ));
    }
    Ok(())
}

/// Write a checked raw frame losslessly.
fn save_raw(raw: &RawFrame, path: &Path) -> Result<(), StoreError> {
    let corrupt = || StoreError::Corrupt {
        index: raw.index,
        reason: "pixel buffer does not match frame size".to_string(),
    };

    match raw.channels {
        1 => GrayImage::from_raw(raw.width, raw.height, raw.data.clone())
            .ok_or_else(corrupt)?
            .save_with_format(path, ImageFormat::Png)?,
        _ => RgbImage::from_raw(raw.width, raw.height, raw.data.clone())
            .ok_or_else(corrupt)?
            .save_with_format(path, ImageFormat::Png)?,
    }
    Ok(())
}

fn load_raw(path: &Path, index: u64, source_fps: f64) -> Result<RawFrame, StoreError> {
    let image = image::open(path)?.to_rgb8();
    let (width, height) = image.dimensions();
    Ok(RawFrame::rgb(index, source_fps, width, height, image.into_raw()))
}
