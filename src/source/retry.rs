//! Retry and backoff helpers for remote downloads.

use std::time::Duration;

/// Default number of retry attempts for transient network errors.
pub const DEFAULT_NETWORK_RETRIES: u32 = 3;

/// Base delay for exponential backoff (1 second).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum delay cap for exponential backoff (30 seconds).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Whether a reqwest error is likely to go away on retry.
///
/// Connection failures, timeouts and interrupted bodies are transient;
/// anything else (bad URL, TLS, decoding) is not.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() || error.is_body() {
        return true;
    }

    error.status().is_some_and(|s| is_transient_status(s.as_u16()))
}

/// 502 Bad Gateway, 503 Service Unavailable, 504 Gateway Timeout.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// Exponential backoff: `min(base * 2^attempt + base / 2, max)`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = (base.as_millis() as u64).min(1000);
    let jitter = Duration::from_millis(jitter_ms / 2);
    exponential.saturating_add(jitter).min(max)
}
