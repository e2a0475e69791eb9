#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trace point, trip endpoint, and export row types.
//!
//! A GPS trace is a flat list of [`TracePoint`]s grouped by trip id. The
//! pipeline reduces each trip to a pickup and a dropoff [`EndpointEvent`],
//! and joins those into a [`Segment`]. The `*Row` types are the flat shapes
//! handed to the rendering layer.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single observed GPS position.
///
/// Coordinates are WGS84 degrees. Rows without coordinates never become a
/// `TracePoint`; they are dropped by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Trip identifier (`randomized_id` in the source dataset).
    pub trip_id: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Altitude in meters (`alt`).
    pub altitude: Option<f64>,
    /// Speed (`spd`).
    pub speed: Option<f64>,
    /// Heading in degrees (`azm`).
    pub heading: Option<f64>,
}

impl TracePoint {
    /// Creates a point with only the required fields set.
    #[must_use]
    pub fn new(trip_id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            trip_id: trip_id.into(),
            lat,
            lng,
            altitude: None,
            speed: None,
            heading: None,
        }
    }

    /// Returns the point's position.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// A `(lat, lng)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Which end of a trip an [`EndpointEvent`] represents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum EndpointRole {
    /// First observed position of a trip (where demand originates).
    #[strum(to_string = "pickup", serialize = "pickups", serialize = "demand")]
    Pickup,
    /// Last observed position of a trip (where people are headed).
    #[strum(
        to_string = "dropoff",
        serialize = "dropoffs",
        serialize = "destinations"
    )]
    Dropoff,
}

impl EndpointRole {
    /// Both roles, pickup first.
    pub const ALL: [Self; 2] = [Self::Pickup, Self::Dropoff];
}

/// A trip's pickup or dropoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointEvent {
    /// Trip identifier.
    pub trip_id: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Pickup or dropoff.
    pub role: EndpointRole,
}

impl EndpointEvent {
    /// Builds an endpoint event from the trace point that defines it.
    #[must_use]
    pub fn from_point(point: &TracePoint, role: EndpointRole) -> Self {
        Self {
            trip_id: point.trip_id.clone(),
            lat: point.lat,
            lng: point.lng,
            role,
        }
    }

    /// Returns the event's position.
    #[must_use]
    pub const fn position(&self) -> Position {
        Position {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Straight chord from a trip's pickup to its dropoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Trip identifier.
    pub trip_id: String,
    /// Pickup position.
    pub start: Position,
    /// Dropoff position.
    pub end: Position,
}

/// A tabular export row with a fixed column layout.
pub trait ExportRow: Serialize {
    /// Column names in serialization order.
    const COLUMNS: &'static [&'static str];
}

/// One row of a demand aggregate as consumed by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandRow {
    /// Hex cell identifier as a lowercase hexadecimal string.
    pub h3_index: String,
    /// Number of endpoint events that fell into the cell.
    pub count: u64,
}

impl ExportRow for DemandRow {
    const COLUMNS: &'static [&'static str] = &["h3_index", "count"];
}

/// One row of the segment export.
///
/// Field names match the column names the rendering layer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    /// Trip identifier.
    pub randomized_id: String,
    /// Pickup latitude.
    pub lat_start: f64,
    /// Pickup longitude.
    pub lng_start: f64,
    /// Dropoff latitude.
    pub lat_end: f64,
    /// Dropoff longitude.
    pub lng_end: f64,
}

impl ExportRow for SegmentRow {
    const COLUMNS: &'static [&'static str] =
        &["randomized_id", "lat_start", "lng_start", "lat_end", "lng_end"];
}

impl From<&Segment> for SegmentRow {
    fn from(segment: &Segment) -> Self {
        Self {
            randomized_id: segment.trip_id.clone(),
            lat_start: segment.start.lat,
            lng_start: segment.start.lng,
            lat_end: segment.end.lat,
            lng_end: segment.end.lng,
        }
    }
}
