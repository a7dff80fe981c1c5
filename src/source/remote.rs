//! Download of remote clips to local disk.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::retry::{
    calculate_backoff, is_transient_network_error, is_transient_status, DEFAULT_BACKOFF_BASE,
    DEFAULT_BACKOFF_MAX, DEFAULT_NETWORK_RETRIES,
};
use crate::store::CacheDir;

/// Whether an input string names a remote clip rather than a local file.
pub fn is_remote(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Errors that can occur while downloading a remote clip.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("download of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("network error: {message} (after {attempts} attempts)")]
    Network { message: String, attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streams remote clips to disk, retrying transient failures.
pub struct Downloader {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl Downloader {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            max_retries: DEFAULT_NETWORK_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        })
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, max_retries: u32, base: Duration, max: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Local file a URL downloads to inside `dest_dir`.
    pub fn destination(url: &str, dest_dir: &Path) -> PathBuf {
        let ext = url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");
        dest_dir.join(format!("{}.{}", CacheDir::hash_source(url), ext))
    }

    /// Download `url` into `dest_dir`, reusing an earlier complete download.
    ///
    /// The body is streamed to a `.part` file and renamed when complete, so
    /// an interrupted download is never mistaken for a finished one.
    pub async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        let dest = Self::destination(url, dest_dir);
        if tokio::fs::metadata(&dest).await.is_ok_and(|m| m.len() > 0) {
            log::info!("Reusing downloaded clip {:?}", dest);
            return Ok(dest);
        }
        tokio::fs::create_dir_all(dest_dir).await?;

        let part = dest.with_extension("part");
        let mut attempt = 0;
        loop {
            match self.try_fetch(url, &part).await {
                Ok(()) => break,
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = calculate_backoff(attempt, self.backoff_base, self.backoff_max);
                    log::warn!(
                        "Download attempt {} of {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempt > 0 && is_retryable(&e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(DownloadError::Network {
                        message: e.to_string(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e);
                }
            }
        }

        tokio::fs::rename(&part, &dest).await?;
        log::info!("Downloaded {} to {:?}", url, dest);
        Ok(dest)
    }

    async fn try_fetch(&self, url: &str, part: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(part).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

fn is_retryable(error: &DownloadError) -> bool {
    match error {
        DownloadError::Http(e) => is_transient_network_error(e),
        DownloadError::Status { status, .. } => is_transient_status(*status),
        _ => false,
    }
}
