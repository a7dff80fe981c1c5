//! FFmpeg subprocess decoding.
//!
//! `ffprobe` reports the stream properties; `ffmpeg` decodes and scales the
//! video to the terminal grid and writes raw `rgb24` frames to its stdout.

use serde::Deserialize;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{SourceError, SourceInfo};
use crate::frame::RawFrame;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
///
/// Returns `None` for zero, negative or malformed rates (`0/0` is common for
/// streams without timing information).
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Parse `ffprobe -of json` output into the native stream properties.
///
/// The returned width/height are the encoded picture size, not the size of
/// the frames this crate delivers.
pub fn parse_probe_output(json: &str) -> Result<SourceInfo, SourceError> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| SourceError::Probe(e.to_string()))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Probe("no video stream".to_string()))?;

    let rates = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()];
    let fps = rates
        .iter()
        .flatten()
        .find_map(|r| parse_frame_rate(r))
        .ok_or_else(|| {
            SourceError::UnknownFrameRate(
                rates.iter().flatten().copied().collect::<Vec<_>>().join(", "),
            )
        })?;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0);

    Ok(SourceInfo {
        fps,
        frame_count,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

/// Run ffprobe on a file.
pub fn probe(path: &Path) -> Result<SourceInfo, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error("ffprobe", e))?;

    if !output.status.success() {
        return Err(SourceError::Probe(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn spawn_error(program: &'static str, e: std::io::Error) -> SourceError {
    if e.kind() == ErrorKind::NotFound {
        SourceError::FfmpegNotFound
    } else {
        SourceError::SpawnFailed { program, source: e }
    }
}

/// Frames decoded by an `ffmpeg` child process, scaled to `cols x rows`.
pub struct FfmpegSource {
    path: PathBuf,
    info: SourceInfo,
    child: Child,
    stdout: ChildStdout,
    stderr_thread: Option<JoinHandle<Vec<String>>>,
    next_index: u64,
    scratch: Vec<u8>,
}

impl FfmpegSource {
    /// Probe `path` and start decoding it at the terminal grid size.
    pub fn open(path: &Path, cols: u16, rows: u16) -> Result<Self, SourceError> {
        let probed = probe(path)?;
        log::info!(
            "Probed {:?}: {}x{} @ {:.3} fps, {:?} frames",
            path,
            probed.width,
            probed.height,
            probed.fps,
            probed.frame_count
        );

        let scale = format!("scale={}:{}", cols, rows);
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-vf", &scale, "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e))?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::SpawnFailed {
            program: "ffmpeg",
            source: std::io::Error::new(ErrorKind::BrokenPipe, "stdout not captured"),
        })?;

        // Collect stderr on a thread so a chatty decoder never blocks on a full pipe
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            lines.push(l);
                        }
                        Err(_) => break,
                    }
                }
                lines
            })
        });

        let info = SourceInfo {
            fps: probed.fps,
            frame_count: probed.frame_count,
            width: cols as u32,
            height: rows as u32,
        };
        let frame_len = cols as usize * rows as usize * 3;

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            stderr_thread,
            next_index: 0,
            scratch: vec![0; frame_len],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read exactly one frame into `scratch`. `Ok(false)` on a clean end of
    /// stream (no bytes of a new frame were available).
    fn read_into_scratch(&mut self) -> Result<bool, SourceError> {
        let index = self.next_index;
        let mut filled = 0;
        while filled < self.scratch.len() {
            match self.stdout.read(&mut self.scratch[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Read { index, source: e }),
            }
        }

        if filled == 0 {
            self.log_decoder_errors();
            return Ok(false);
        }
        if filled < self.scratch.len() {
            self.log_decoder_errors();
            return Err(SourceError::TruncatedFrame { index });
        }

        self.next_index += 1;
        Ok(true)
    }

    fn log_decoder_errors(&mut self) {
        if let Some(lines) = self.stderr_thread.take().and_then(|h| h.join().ok()) {
            for line in lines {
                log::warn!("[ffmpeg] {}", line);
            }
        }
    }

    /// Stop the decoder: SIGINT first, then kill if it lingers.
    fn shutdown(&mut self) {
        if !matches!(self.child.try_wait(), Ok(None)) {
            return;
        }

        #[cfg(unix)]
        {
            // SAFETY: plain signal delivery to our own child process
            unsafe {
                libc::kill(self.child.id() as i32, libc::SIGINT);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }

        let start = Instant::now();
        let timeout = Duration::from_millis(500);
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if start.elapsed() > timeout => {
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    return;
                }
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(_) => return,
            }
        }
    }
}

impl super::VideoSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        let index = self.next_index;
        if !self.read_into_scratch()? {
            return Ok(None);
        }
        Ok(Some(RawFrame::rgb(
            index,
            self.info.fps,
            self.info.width,
            self.info.height,
            self.scratch.clone(),
        )))
    }

    fn skip_frame(&mut self) -> Result<bool, SourceError> {
        self.read_into_scratch()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
        assert_eq!(parse_frame_rate("-5/1"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30/1",
                    "avg_frame_rate": "30/1",
                    "nb_frames": "901"
                }
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.frame_count, Some(901));
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_r_frame_rate() {
        let json = r#"{"streams":[{"width":640,"height":480,"avg_frame_rate":"0/0","r_frame_rate":"24/1"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.fps, 24.0);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn test_parse_probe_output_without_rate() {
        let json = r#"{"streams":[{"width":640,"height":480,"avg_frame_rate":"0/0"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(SourceError::UnknownFrameRate(_))
        ));
    }

    #[test]
    fn test_parse_probe_output_without_stream() {
        assert!(matches!(
            parse_probe_output(r#"{"streams":[]}"#),
            Err(SourceError::Probe(_))
        ));
        assert!(matches!(parse_probe_output("not json"), Err(SourceError::Probe(_))));
    }

    #[test]
    fn test_probe_missing_file() {
        let err = probe(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
