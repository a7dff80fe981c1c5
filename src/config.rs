//! Configuration file handling for termcine.
//!
//! Loads configuration from `<config dir>/termcine/config.toml` or a custom
//! path, then merges it with command-line flags into a [`PlayerConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::glyph::{Charset, ColorMode};
use crate::source::is_remote;

/// Accepted `--fps` / `playback.fps` range.
pub const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=120;

/// Configuration file structure for termcine.
/// Loaded from ~/.config/termcine/config.toml (or custom path via --config).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Target display rate; the source rate when unset
    #[serde(default)]
    pub fps: Option<u32>,
    /// Skip frames to catch up when rendering falls behind
    #[serde(default = "default_true")]
    pub skip: bool,
    #[serde(default)]
    pub debug: bool,
    /// Wait for a key press before playback starts
    #[serde(default = "default_true")]
    pub wait_for_key: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: None,
            skip: true,
            debug: false,
            wait_for_key: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub invert: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            charset: default_charset(),
            invert: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub mute: bool,
}

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    ColorMode::Off.name().to_string()
}

fn default_charset() -> String {
    Charset::Standard.name().to_string()
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            log::info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Invalid(message) => write!(f, "Invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("termcine").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/termcine/config.toml")
        })
}

/// Default root for frame caches, downloads and the log file.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("termcine"))
        .unwrap_or_else(|| PathBuf::from(".termcine"))
}

/// Where the video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Local(PathBuf),
    Remote(String),
}

impl InputSource {
    /// Stable identity of the source, used to derive its cache directory.
    pub fn cache_identity(&self) -> String {
        match self {
            InputSource::Local(path) => std::fs::canonicalize(path)
                .unwrap_or_else(|_| path.clone())
                .display()
                .to_string(),
            InputSource::Remote(url) => url.clone(),
        }
    }
}

/// How the on-disk frame cache is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Quantize while playing, nothing persisted
    #[default]
    None,
    /// Play from an existing cache (`-c`)
    Read,
    /// Extract and quantize everything to the cache, then play (`-w`)
    Write,
}

/// Subtitle request from `--sub [LANG]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRequest {
    pub lang: Option<String>,
}

/// Validated settings for one playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub input: InputSource,
    pub target_fps: Option<u32>,
    pub color: ColorMode,
    pub charset: Charset,
    pub invert: bool,
    pub skip_enabled: bool,
    pub debug_overlay: bool,
    pub wait_for_key: bool,
    pub cache_mode: CacheMode,
    pub subtitles: Option<SubtitleRequest>,
    pub mute: bool,
    pub cache_root: PathBuf,
}

impl PlayerConfig {
    /// One-line summary for the log.
    pub fn describe(&self) -> String {
        format!(
            "fps={} color={} charset={} invert={} skip={} debug={} cache={:?} mute={}",
            self.target_fps
                .map(|f| f.to_string())
                .unwrap_or_else(|| "source".to_string()),
            self.color.name(),
            self.charset.name(),
            self.invert,
            self.skip_enabled,
            self.debug_overlay,
            self.cache_mode,
            self.mute
        )
    }

    /// Merge flags over file values and validate the result.
    pub fn resolve(args: &Args, config: &Config) -> Result<Self, ConfigError> {
        let input = match (&args.input, &args.url) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "give either a file or --url, not both".to_string(),
                ))
            }
            (None, Some(url)) if is_remote(url) => InputSource::Remote(url.clone()),
            (None, Some(url)) => {
                return Err(ConfigError::Invalid(format!(
                    "--url needs an http(s) URL, got '{}'",
                    url
                )))
            }
            (Some(input), None) if is_remote(input) => InputSource::Remote(input.clone()),
            (Some(input), None) => InputSource::Local(PathBuf::from(input)),
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "no video given (pass a file or --url)".to_string(),
                ))
            }
        };

        let target_fps = args.fps.or(config.playback.fps);
        if let Some(fps) = target_fps {
            if !FPS_RANGE.contains(&fps) {
                return Err(ConfigError::Invalid(format!(
                    "fps must be between {} and {}, got {}",
                    FPS_RANGE.start(),
                    FPS_RANGE.end(),
                    fps
                )));
            }
        }

        let color = match args.color {
            Some(choice) => choice.into(),
            None => ColorMode::from_name(&config.render.color).ok_or_else(|| {
                ConfigError::Invalid(format!("unknown color mode '{}'", config.render.color))
            })?,
        };

        let charset = match args.charset {
            Some(choice) => choice.into(),
            None => Charset::from_name(&config.render.charset).ok_or_else(|| {
                ConfigError::Invalid(format!("unknown charset '{}'", config.render.charset))
            })?,
        };

        let cache_mode = match (args.cache, args.write) {
            (true, true) => {
                return Err(ConfigError::Invalid(
                    "-c and -w cannot be combined".to_string(),
                ))
            }
            (true, false) => CacheMode::Read,
            (false, true) => CacheMode::Write,
            (false, false) => CacheMode::None,
        };

        let cache_root = args
            .cache_dir
            .clone()
            .or_else(|| config.cache.dir.clone())
            .unwrap_or_else(default_cache_root);

        Ok(Self {
            input,
            target_fps,
            color,
            charset,
            invert: args.invert || config.render.invert,
            skip_enabled: !args.noskip && config.playback.skip,
            debug_overlay: args.debug || config.playback.debug,
            wait_for_key: !args.no_wait && config.playback.wait_for_key,
            cache_mode,
            subtitles: args.sub.clone().map(|lang| SubtitleRequest { lang }),
            mute: args.mute || config.audio.mute,
            cache_root,
        })
    }
}
