//! HTTP client for the Google Maps web services.
//!
//! Wraps `reqwest` with key management, retry on transient failures and a
//! check of the `"status"` field every Maps response carries.

use std::time::Duration;

use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::MapsError;
use crate::retry::retry_with_backoff;
use crate::types::{
    DirectionsResponse, DistanceMatrix, DistanceMatrixResponse, GeocodeResponse, GeocodeResult,
    RouteSummary, Waypoint,
};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Client for the geocoding, directions and distance matrix endpoints.
///
/// Use [`MapsClient::new`] for production or [`MapsClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Debug, Clone)]
pub struct MapsClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl MapsClient {
    /// Creates a client pointed at the production Maps API.
    ///
    /// # Errors
    ///
    /// Returns [`MapsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, MapsError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`MapsError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`MapsError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, MapsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent("jeffy/0.1 (delivery-eta)")
            .build()?;

        // Exactly one trailing slash so `Url::join` appends endpoint paths
        // instead of replacing the last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| MapsError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the retry budget. A `backoff_base_ms` of zero retries
    /// without sleeping.
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Resolves a free-form address to its best coordinate match.
    ///
    /// # Errors
    ///
    /// - [`MapsError::NoResults`] if nothing matches.
    /// - [`MapsError::QuotaExceeded`] / [`MapsError::ApiError`] for non-OK statuses.
    /// - [`MapsError::Http`] after retries are exhausted.
    pub async fn geocode(&self, address: &str) -> Result<GeocodeResult, MapsError> {
        let url = self.build_url("geocode/json", &[("address", address)])?;
        let context = format!("geocode(address={address})");
        let response: GeocodeResponse = self.fetch(&url, &context).await?;

        let entry = response
            .results
            .into_iter()
            .next()
            .ok_or(MapsError::NoResults(context))?;
        Ok(GeocodeResult {
            formatted_address: entry.formatted_address,
            location: entry.geometry.location,
            place_id: entry.place_id,
        })
    }

    /// Driving route between two points. Only the first route is used and
    /// its legs are summed.
    ///
    /// # Errors
    ///
    /// Same as [`MapsClient::geocode`].
    pub async fn directions(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
    ) -> Result<RouteSummary, MapsError> {
        let origin = origin.to_string();
        let destination = destination.to_string();
        let url = self.build_url(
            "directions/json",
            &[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", "driving"),
            ],
        )?;
        let context = format!("directions({origin} -> {destination})");
        let response: DirectionsResponse = self.fetch(&url, &context).await?;

        response
            .routes
            .into_iter()
            .next()
            .map(crate::types::Route::into_summary)
            .ok_or(MapsError::NoResults(context))
    }

    /// Travel distance and time for every origin/destination pair.
    ///
    /// # Errors
    ///
    /// Same as [`MapsClient::geocode`]. Per-cell failures are reported in
    /// [`crate::MatrixCell::status`] rather than as an error.
    pub async fn distance_matrix(
        &self,
        origins: &[Waypoint],
        destinations: &[Waypoint],
    ) -> Result<DistanceMatrix, MapsError> {
        if origins.is_empty() || destinations.is_empty() {
            return Err(MapsError::ApiError {
                status: "INVALID_REQUEST".to_owned(),
                message: "distance matrix needs at least one origin and one destination"
                    .to_owned(),
            });
        }
        let origins = join_waypoints(origins);
        let destinations = join_waypoints(destinations);
        let url = self.build_url(
            "distancematrix/json",
            &[
                ("origins", origins.as_str()),
                ("destinations", destinations.as_str()),
                ("mode", "driving"),
            ],
        )?;
        let response: DistanceMatrixResponse = self.fetch(&url, "distancematrix").await?;
        Ok(response.into_matrix())
    }

    /// Builds `{base}{endpoint}?key=..&{params}` with encoded values.
    fn build_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, MapsError> {
        let mut url = self
            .base_url
            .join(endpoint)
            .map_err(|e| MapsError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url, context: &str) -> Result<T, MapsError> {
        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.request_json(url)
        })
        .await?;
        check_status(&body, context)?;
        serde_json::from_value(body).map_err(|e| MapsError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }

    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, MapsError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(MapsError::Throttled {
                status: status.as_u16(),
                retry_after: parse_retry_after(response.headers().get(RETRY_AFTER)),
            });
        }
        let response = response.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MapsError::Deserialize {
            // The key sits in the query string; keep it out of error messages.
            context: url.path().to_owned(),
            source: e,
        })
    }
}

/// Only the delay-seconds form of `Retry-After`; an HTTP date is ignored.
pub(crate) fn parse_retry_after(value: Option<&HeaderValue>) -> Option<Duration> {
    value?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn join_waypoints(points: &[Waypoint]) -> String {
    points
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Maps the envelope `status` to a [`MapsError`].
pub(crate) fn check_status(body: &serde_json::Value, context: &str) -> Result<(), MapsError> {
    let status = body
        .get("status")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("MISSING_STATUS");
    let message = || {
        body.get("error_message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(status)
            .to_owned()
    };
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(MapsError::NoResults(context.to_owned())),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(MapsError::QuotaExceeded(message())),
        other => Err(MapsError::ApiError {
            status: other.to_owned(),
            message: message(),
        }),
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
