//! Google Maps HTTP client used for address geocoding and delivery ETAs.

mod client;
mod error;
mod retry;
pub mod types;

pub use client::MapsClient;
pub use error::MapsError;
pub use types::{DistanceMatrix, GeocodeResult, LatLng, MatrixCell, RouteSummary, Waypoint};
