//! Trip search response DTOs.
//!
//! The trip service speaks a FPTF-flavoured JSON: ISO 8601 timestamps with
//! offsets, delays in seconds, station ids as strings.

use serde::Deserialize;

/// Response to `GET /trips?query=&when=`.
#[derive(Debug, Clone, Deserialize)]
pub struct TripsResponse {
    #[serde(default)]
    pub trips: Vec<TripSummary>,
}

/// A trip search hit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub id: String,
    pub origin: Option<TripStation>,
    pub planned_departure: Option<String>,
}

/// Response to `GET /trips/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TripResponse {
    pub trip: TripDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripDetails {
    #[serde(default)]
    pub stopovers: Vec<Stopover>,
    pub polyline: Option<FeatureCollection>,
    #[serde(default)]
    pub remarks: Vec<Remark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripStation {
    pub id: Option<String>,
    pub name: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One stop of a trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stopover {
    pub stop: TripStation,
    pub planned_arrival: Option<String>,
    pub arrival: Option<String>,
    /// Seconds
    pub arrival_delay: Option<i64>,
    pub planned_departure: Option<String>,
    pub departure: Option<String>,
    /// Seconds
    pub departure_delay: Option<i64>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub additional_stop: bool,
}

/// GeoJSON path as a collection of points.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// `[longitude, latitude]`
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub valid_from: Option<String>,
}
