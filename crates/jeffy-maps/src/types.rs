//! Google Maps wire types and the summaries the client returns.
//!
//! Every response carries a top-level `status` (and sometimes
//! `error_message`); the client checks it before deserializing the rest.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Either end of a route: a free-form address or a coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum Waypoint {
    Address(String),
    Coordinates(LatLng),
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::Coordinates(LatLng { lat, lng }) => write!(f, "{lat},{lng}"),
        }
    }
}

impl From<LatLng> for Waypoint {
    fn from(value: LatLng) -> Self {
        Self::Coordinates(value)
    }
}

impl From<&str> for Waypoint {
    fn from(value: &str) -> Self {
        Self::Address(value.to_owned())
    }
}

impl Waypoint {
    /// Builds a destination from a stored shipping-address object.
    ///
    /// Uses `latitude`/`longitude` when the address was geocoded, otherwise
    /// joins the non-empty text fields. `None` when neither is present.
    #[must_use]
    pub fn from_address_json(address: &serde_json::Value) -> Option<Self> {
        let coord = |key: &str| address.get(key).and_then(serde_json::Value::as_f64);
        if let (Some(lat), Some(lng)) = (coord("latitude"), coord("longitude")) {
            return Some(Self::Coordinates(LatLng { lat, lng }));
        }

        let parts: Vec<&str> = ["line1", "line2", "city", "region", "postal_code", "country"]
            .iter()
            .filter_map(|key| address.get(*key).and_then(serde_json::Value::as_str))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(Self::Address(parts.join(", ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Results handed to callers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub location: LatLng,
    pub place_id: Option<String>,
}

/// Totals for the first route, summed across its legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub summary: String,
    pub polyline: Option<String>,
}

/// One origin/destination pair. Distance and duration are `None` when the
/// element status is not `OK`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixCell {
    pub origin_index: usize,
    pub destination_index: usize,
    pub status: String,
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistanceMatrix {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub cells: Vec<MatrixCell>,
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeEntry {
    pub formatted_address: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Route {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub legs: Vec<Leg>,
    #[serde(default)]
    pub overview_polyline: Option<Polyline>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Polyline {
    pub points: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Leg {
    pub distance: Measure,
    pub duration: Measure,
}

/// `{ "value": 1234, "text": "1.2 km" }`; only the raw value is used.
#[derive(Debug, Deserialize)]
pub(crate) struct Measure {
    pub value: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DistanceMatrixResponse {
    #[serde(default)]
    pub origin_addresses: Vec<String>,
    #[serde(default)]
    pub destination_addresses: Vec<String>,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatrixElement {
    pub status: String,
    #[serde(default)]
    pub distance: Option<Measure>,
    #[serde(default)]
    pub duration: Option<Measure>,
}

impl Route {
    pub(crate) fn into_summary(self) -> RouteSummary {
        let (distance_meters, duration_seconds) = self
            .legs
            .iter()
            .fold((0u64, 0u64), |(d, t), leg| {
                (
                    d.saturating_add(leg.distance.value),
                    t.saturating_add(leg.duration.value),
                )
            });
        RouteSummary {
            distance_meters,
            duration_seconds,
            summary: self.summary,
            polyline: self.overview_polyline.map(|p| p.points),
        }
    }
}

impl DistanceMatrixResponse {
    pub(crate) fn into_matrix(self) -> DistanceMatrix {
        let cells = self
            .rows
            .into_iter()
            .enumerate()
            .flat_map(|(origin_index, row)| {
                row.elements
                    .into_iter()
                    .enumerate()
                    .map(move |(destination_index, element)| {
                        let ok = element.status == "OK";
                        MatrixCell {
                            origin_index,
                            destination_index,
                            distance_meters: element.distance.filter(|_| ok).map(|m| m.value),
                            duration_seconds: element.duration.filter(|_| ok).map(|m| m.value),
                            status: element.status,
                        }
                    })
            })
            .collect();
        DistanceMatrix {
            origins: self.origin_addresses,
            destinations: self.destination_addresses,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoint_formats_coordinates_without_spaces() {
        let wp = Waypoint::from(LatLng {
            lat: 51.5074,
            lng: -0.1278,
        });
        assert_eq!(wp.to_string(), "51.5074,-0.1278");
        assert_eq!(Waypoint::from("1 High St").to_string(), "1 High St");
    }

    #[test]
    fn address_json_prefers_coordinates() {
        let address = serde_json::json!({
            "line1": "1 High St",
            "city": "Leeds",
            "latitude": 53.8,
            "longitude": -1.55
        });
        assert_eq!(
            Waypoint::from_address_json(&address),
            Some(Waypoint::Coordinates(LatLng {
                lat: 53.8,
                lng: -1.55
            }))
        );
    }

    #[test]
    fn address_json_joins_text_fields() {
        let address = serde_json::json!({
            "line1": "1 High St",
            "line2": "",
            "city": "Leeds",
            "postal_code": "LS1 1AA",
            "country": "GB"
        });
        assert_eq!(
            Waypoint::from_address_json(&address),
            Some(Waypoint::Address("1 High St, Leeds, LS1 1AA, GB".to_string()))
        );
        assert_eq!(Waypoint::from_address_json(&serde_json::json!({})), None);
    }

    #[test]
    fn route_summary_sums_every_leg() {
        let route: Route = serde_json::from_value(serde_json::json!({
            "summary": "A64",
            "legs": [
                { "distance": { "value": 1200, "text": "1.2 km" }, "duration": { "value": 300, "text": "5 mins" } },
                { "distance": { "value": 800, "text": "0.8 km" }, "duration": { "value": 120, "text": "2 mins" } }
            ]
        }))
        .unwrap();
        let summary = route.into_summary();
        assert_eq!(summary.distance_meters, 2000);
        assert_eq!(summary.duration_seconds, 420);
        assert_eq!(summary.polyline, None);
    }

    #[test]
    fn matrix_blanks_cells_that_are_not_ok() {
        let response: DistanceMatrixResponse = serde_json::from_value(serde_json::json!({
            "origin_addresses": ["Leeds"],
            "destination_addresses": ["York", "Atlantis"],
            "rows": [{ "elements": [
                { "status": "OK", "distance": { "value": 40000, "text": "" }, "duration": { "value": 2400, "text": "" } },
                { "status": "NOT_FOUND" }
            ]}]
        }))
        .unwrap();
        let matrix = response.into_matrix();
        assert_eq!(matrix.cells.len(), 2);
        assert_eq!(matrix.cells[0].distance_meters, Some(40000));
        assert_eq!(matrix.cells[1].destination_index, 1);
        assert_eq!(matrix.cells[1].duration_seconds, None);
    }
}
