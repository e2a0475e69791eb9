#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the trip demand server.
//!
//! These types are serialized to JSON for the REST API. Row payloads reuse
//! the export rows from `trip_demand_trace_models` so the API and file
//! exports share column names.

use serde::{Deserialize, Serialize};
use trip_demand_trace_models::{DemandRow, EndpointRole, Position, SegmentRow};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Grid index revision the server bound to.
    pub index_revision: String,
}

/// Query parameters selecting an endpoint role.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleQueryParams {
    /// `pickup` (alias `demand`) or `dropoff` (alias `destinations`).
    /// Defaults to `pickup`.
    pub role: Option<String>,
}

/// Query parameters for the top-cells endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopQueryParams {
    /// Endpoint role, as in [`RoleQueryParams`].
    pub role: Option<String>,
    /// How many cells to return. Defaults to 20.
    pub n: Option<usize>,
}

/// Query parameters for the segments endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQueryParams {
    /// Maximum rows. `0` means no limit; absent uses the server default.
    pub limit: Option<usize>,
}

/// Per-cell counts for one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDemand {
    /// Which endpoints were counted.
    pub role: EndpointRole,
    /// Grid resolution.
    pub resolution: u8,
    /// Sum of all counts.
    pub total: u64,
    /// Rows dropped because their coordinates had no cell.
    pub cell_mapping_failures: u64,
    /// Smallest per-cell count, for the colour scale. `None` when empty.
    pub count_min: Option<u64>,
    /// Largest per-cell count, for the colour scale. `None` when empty.
    pub count_max: Option<u64>,
    /// One row per cell.
    pub cells: Vec<DemandRow>,
}

impl ApiDemand {
    /// The payload served when the dataset has no usable rows.
    #[must_use]
    pub const fn empty(role: EndpointRole, resolution: u8) -> Self {
        Self {
            role,
            resolution,
            total: 0,
            cell_mapping_failures: 0,
            count_min: None,
            count_max: None,
            cells: Vec::new(),
        }
    }
}

/// Start→finish segments with a suggested map centre.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSegments {
    /// Mean start position, or the fixed fallback centre.
    pub map_center: Position,
    /// Trip ids in row order.
    pub trip_ids: Vec<String>,
    /// One row per trip.
    pub segments: Vec<SegmentRow>,
}

/// Error body for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}
