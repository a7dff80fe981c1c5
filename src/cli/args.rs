//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{CharacterSet, ColorChoice};

/// Play a video as text in the terminal, in time with its soundtrack
#[derive(Parser, Debug)]
#[command(name = "termcine")]
#[command(version, about = "Terminal video player", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Local video file
    pub input: Option<String>,

    /// Play a remote video (downloaded first)
    #[arg(short = 'y', long, value_name = "URL")]
    pub url: Option<String>,

    /// Play from the existing frame cache
    #[arg(short = 'c', long, conflicts_with = "write")]
    pub cache: bool,

    /// Extract and convert every frame to the cache, then play
    #[arg(short = 'w', long)]
    pub write: bool,

    /// Show subtitles, optionally in a given language
    #[arg(long, value_name = "LANG", num_args = 0..=1)]
    pub sub: Option<Option<String>>,

    /// Display frame rate (1-120)
    #[arg(short = 'f', long, value_parser = clap::value_parser!(u32).range(1..=120))]
    pub fps: Option<u32>,

    /// Never skip frames to catch up
    #[arg(long)]
    pub noskip: bool,

    /// Start playing without waiting for a key press
    #[arg(long)]
    pub no_wait: bool,

    /// Show the measured frame rate
    #[arg(long)]
    pub debug: bool,

    /// Color output (bare --color means ansi256)
    #[arg(long, value_name = "MODE", num_args = 0..=1, default_missing_value = "ansi256")]
    pub color: Option<ColorChoice>,

    /// Glyph ramp
    #[arg(long)]
    pub charset: Option<CharacterSet>,

    /// Invert brightness (for light terminals)
    #[arg(long)]
    pub invert: bool,

    /// Play without audio
    #[arg(long)]
    pub mute: bool,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for frame caches, downloads and the log
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
