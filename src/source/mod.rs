//! Video sources: where raw frames come from.
//!
//! The playback pipeline only needs sequential decoded frames plus the
//! source frame rate; [`VideoSource`] is that seam. [`FfmpegSource`] decodes
//! local files through an `ffmpeg` subprocess, and [`Downloader`] fetches
//! remote clips to disk first.

mod ffmpeg;
mod remote;
mod retry;

use std::path::PathBuf;

use crate::frame::RawFrame;

pub use ffmpeg::{parse_frame_rate, parse_probe_output, probe, FfmpegSource};
pub use remote::{is_remote, DownloadError, Downloader};
pub use retry::{calculate_backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_NETWORK_RETRIES};

/// Stream properties reported by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// Source frame rate in frames per second
    pub fps: f64,
    /// Total frame count, when the container reports one
    pub frame_count: Option<u64>,
    /// Width of delivered frames in pixels
    pub width: u32,
    /// Height of delivered frames in pixels
    pub height: u32,
}

/// Errors raised by video sources. Fatal before playback starts.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("FFmpeg not found. Please install ffmpeg (which provides ffmpeg and ffprobe)")]
    FfmpegNotFound,

    #[error("video file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("could not probe video: {0}")]
    Probe(String),

    #[error("video has no usable frame rate ({0})")]
    UnknownFrameRate(String),

    #[error("failed to read frame {index}: {source}")]
    Read {
        index: u64,
        source: std::io::Error,
    },

    #[error("decoder stopped mid-frame at frame {index}")]
    TruncatedFrame { index: u64 },
}

/// Sequential access to decoded frames.
pub trait VideoSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Decode the next frame, `Ok(None)` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError>;

    /// Advance past the next frame without building a [`RawFrame`].
    /// Returns `false` at the end of the stream.
    fn skip_frame(&mut self) -> Result<bool, SourceError> {
        Ok(self.next_frame()?.is_some())
    }
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn info(&self) -> &SourceInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        (**self).next_frame()
    }

    fn skip_frame(&mut self) -> Result<bool, SourceError> {
        (**self).skip_frame()
    }
}
