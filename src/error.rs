//! Session-level error taxonomy.
//!
//! Only fatal conditions end up here. Recoverable ones (a dropped frame, a
//! stale cache, a missing audio clock) are logged and reported in the
//! session summary instead.

use crate::config::ConfigError;
use crate::renderer::SurfaceError;
use crate::source::{DownloadError, SourceError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("frame cache error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl SessionError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::Config(_) => 2,
            _ => 1,
        }
    }
}
