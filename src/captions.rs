//! SRT subtitles.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading captions.
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("failed to read captions {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no cues found in {0}")]
    Empty(PathBuf),
}

/// One timed caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Caption track sorted by start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captions {
    cues: Vec<Cue>,
}

impl Captions {
    /// Parse SRT text. Malformed blocks are skipped.
    pub fn parse(srt: &str) -> Self {
        let normalized = srt.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let mut cues: Vec<Cue> = normalized
            .split("\n\n")
            .filter_map(parse_block)
            .collect();
        cues.sort_by_key(|c| c.start);
        Self { cues }
    }

    pub fn load(path: &Path) -> Result<Self, CaptionError> {
        let content = std::fs::read_to_string(path).map_err(|e| CaptionError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let captions = Self::parse(&content);
        if captions.is_empty() {
            return Err(CaptionError::Empty(path.to_path_buf()));
        }
        log::info!("Loaded {} caption cues from {:?}", captions.len(), path);
        Ok(captions)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Caption showing at `t`, if any.
    pub fn at(&self, t: Duration) -> Option<&str> {
        // Last cue starting at or before t
        let upto = self.cues.partition_point(|c| c.start <= t);
        self.cues[..upto]
            .iter()
            .rev()
            .find(|c| t < c.end)
            .map(|c| c.text.as_str())
    }
}

/// Sidecar subtitle file for a video: `clip.en.srt` when a language is
/// given and exists, otherwise `clip.srt`.
pub fn sidecar_path(video: &Path, lang: Option<&str>) -> Option<PathBuf> {
    if let Some(lang) = lang {
        let with_lang = video.with_extension(format!("{}.srt", lang));
        if with_lang.exists() {
            return Some(with_lang);
        }
    }
    let plain = video.with_extension("srt");
    plain.exists().then_some(plain)
}

fn parse_block(block: &str) -> Option<Cue> {
    let mut lines = block.lines().map(str::trim_end).skip_while(|l| l.trim().is_empty());
    let mut timing = lines.next()?;
    if !timing.contains("-->") {
        // Sequence number line
        timing = lines.next()?;
    }

    let (start, end) = timing.split_once("-->")?;
    let start = parse_timestamp(start.trim())?;
    // Position hints may follow the end time
    let end = parse_timestamp(end.split_whitespace().next()?)?;

    let text = lines
        .filter(|l| !l.is_empty())
        .map(strip_tags)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return None;
    }

    Some(Cue { start, end, text })
}

/// `HH:MM:SS,mmm` (a `.` separator is accepted too).
fn parse_timestamp(s: &str) -> Option<Duration> {
    let (hms, millis) = s.split_once([',', '.']).unwrap_or((s, "0"));
    let mut parts = hms.split(':').map(|p| p.trim().parse::<u64>());
    let (h, m, sec) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(h)), Some(Ok(m)), Some(Ok(s)), None) => (h, m, s),
        (Some(Ok(m)), Some(Ok(s)), None, None) => (0, m, s),
        _ => return None,
    };
    let millis: u64 = millis.trim().parse().ok()?;
    Some(Duration::from_millis(((h * 60 + m) * 60 + sec) * 1000 + millis))
}

/// Drop `<i>`-style markup.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
