//! Retries for the Maps client.
//!
//! Transient failures (network errors, 5xx, HTTP 429) are retried; a
//! throttling response that names a `Retry-After` delay is honoured instead
//! of the computed back-off. Quota exhaustion reported in the JSON envelope
//! is final for the day and never retried.

use std::future::Future;
use std::time::Duration;

use crate::error::MapsError;

/// Upper bound on any single wait, including a server-supplied one.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Returns `true` for errors that are worth retrying after a delay.
///
/// Client errors other than 429 mean the request itself is wrong (bad key,
/// bad parameters), so they fail fast.
pub(crate) fn is_retriable(err: &MapsError) -> bool {
    match err {
        MapsError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        MapsError::Throttled { .. } => true,
        MapsError::NoResults(_)
        | MapsError::QuotaExceeded(_)
        | MapsError::ApiError { .. }
        | MapsError::InvalidBaseUrl { .. }
        | MapsError::Deserialize { .. } => false,
    }
}

/// Wait before retry number `attempt` (1-based).
///
/// `Retry-After` wins when present. Otherwise `backoff_base_ms * 2^(attempt-1)`
/// with ±25 % jitter. Both are capped at [`MAX_DELAY`].
pub(crate) fn delay_before_retry(err: &MapsError, attempt: u32, backoff_base_ms: u64) -> Duration {
    if let MapsError::Throttled {
        retry_after: Some(wait),
        ..
    } = err
    {
        return (*wait).min(MAX_DELAY);
    }
    let exponential = backoff_base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let jitter = rand::random::<f64>() * 0.5 + 0.75;
    Duration::from_millis(exponential)
        .min(MAX_DELAY)
        .mul_f64(jitter)
        .min(MAX_DELAY)
}

/// Runs `operation`, retrying transient failures up to `max_retries` times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, MapsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MapsError>>,
{
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retries == max_retries || !is_retriable(&err) {
            return Err(err);
        }
        retries += 1;
        let delay = delay_before_retry(&err, retries, backoff_base_ms);
        tracing::warn!(
            retry = retries,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "maps request failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
