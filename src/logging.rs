//! Log setup. The terminal belongs to the video, so logs go to a file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Name of the log file inside the cache root.
pub const LOG_FILE: &str = "termcine.log";

/// Send `log` output to `<cache_root>/termcine.log`, truncating it.
/// Default filter is "info" if RUST_LOG is not set.
pub fn init(cache_root: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(cache_root)?;
    let path = cache_root.join(LOG_FILE);
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;

    // A logger may already be installed (tests); keep it
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .try_init();

    log::info!("Starting termcine {}", env!("CARGO_PKG_VERSION"));
    Ok(path)
}
