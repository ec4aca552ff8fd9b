//! Retry with exponential backoff for transient HTTP failures

use std::time::Duration;

use crate::stream::{StreamError, http_config};

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry a fallible request with exponential backoff.
///
/// Retries up to `max_retries` from the global [`HttpConfig`](crate::HttpConfig);
/// with the default of 0 the first error is returned as-is.
pub fn retry_with_backoff<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, StreamError>,
) -> Result<T, StreamError> {
    retry_with_limit(label, http_config().max_retries, attempt_fn)
}

/// [`retry_with_backoff`] with an explicit retry limit.
pub fn retry_with_limit<T>(
    label: &str,
    max_retries: u32,
    mut attempt_fn: impl FnMut() -> Result<T, StreamError>,
) -> Result<T, StreamError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = backoff_duration(attempt);
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying in {delay:?}");
                std::thread::sleep(delay);
            }
            Err(e) => {
                if attempt > 0 {
                    log::error!("{label}: failed permanently after {attempt} retries: {e}");
                }
                return Err(e);
            }
        }
    }
}
