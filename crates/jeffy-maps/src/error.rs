use std::time::Duration;

use thiserror::Error;

/// Errors returned by the Google Maps client.
#[derive(Debug, Error)]
pub enum MapsError {
    /// Network or TLS failure, or a non-2xx HTTP status. The request URL is
    /// stripped because the API key travels in its query string.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP 429 or 503: the service asked us to slow down, optionally saying
    /// for how long. Unlike [`MapsError::QuotaExceeded`] this is transient.
    #[error("maps service throttled the request (HTTP {status})")]
    Throttled {
        status: u16,
        retry_after: Option<Duration>,
    },

    /// The API answered `ZERO_RESULTS` or `NOT_FOUND`.
    #[error("no results for {0}")]
    NoResults(String),

    /// The API answered `OVER_QUERY_LIMIT` or `OVER_DAILY_LIMIT`.
    #[error("maps quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-OK envelope status, e.g. `REQUEST_DENIED`.
    #[error("maps API error {status}: {message}")]
    ApiError { status: String, message: String },

    /// The client was built with an unusable base URL.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The response body did not match the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<reqwest::Error> for MapsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}
