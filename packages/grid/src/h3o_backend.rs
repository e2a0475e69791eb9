//! [`IndexBackend`] implementation on top of `h3o`.
//!
//! `h3o` itself has a single API. [`H3oBackend`] exposes it under either
//! naming scheme and with or without `geo_json` boundary support, so every
//! binding path of the adapter runs against the same underlying grid.

use h3o::{CellIndex, LatLng, Resolution};

use crate::GridError;
use crate::backend::{Capabilities, IndexBackend};

/// Which function-naming scheme a backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiNaming {
    /// `latlng_to_cell` / `cell_to_boundary`.
    Current,
    /// `geo_to_h3` / `h3_to_geo_boundary`.
    Legacy,
}

/// `h3o`-backed grid library.
#[derive(Debug, Clone, Copy)]
pub struct H3oBackend {
    naming: ApiNaming,
    geo_json: bool,
}

impl H3oBackend {
    /// Current naming with `geo_json` boundaries. This is the default
    /// backend bound by [`crate::global`].
    #[must_use]
    pub const fn current() -> Self {
        Self {
            naming: ApiNaming::Current,
            geo_json: true,
        }
    }

    /// Legacy naming; boundaries only come back as `(lat, lng)`.
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            naming: ApiNaming::Legacy,
            geo_json: false,
        }
    }

    /// Explicit naming and `geo_json` support.
    #[must_use]
    pub const fn new(naming: ApiNaming, geo_json: bool) -> Self {
        Self { naming, geo_json }
    }

    fn to_cell(lat: f64, lng: f64, resolution: u8) -> Result<u64, GridError> {
        let resolution =
            Resolution::try_from(resolution).map_err(|_| GridError::InvalidResolution(resolution))?;
        let coord = checked_latlng(lat, lng)?;
        Ok(u64::from(coord.to_cell(resolution)))
    }

    fn boundary(&self, cell: u64, geo_json: bool) -> Result<Vec<(f64, f64)>, GridError> {
        if geo_json && !self.geo_json {
            return Err(GridError::Unavailable("geo_json boundary"));
        }

        let index = CellIndex::try_from(cell).map_err(|e| GridError::BoundaryMapping {
            cell: format!("{cell:x}"),
            reason: e.to_string(),
        })?;

        Ok(index
            .boundary()
            .iter()
            .map(|v| {
                if geo_json {
                    (v.lng(), v.lat())
                } else {
                    (v.lat(), v.lng())
                }
            })
            .collect())
    }
}

impl Default for H3oBackend {
    fn default() -> Self {
        Self::current()
    }
}

impl IndexBackend for H3oBackend {
    fn name(&self) -> &str {
        match (self.naming, self.geo_json) {
            (ApiNaming::Current, true) => "h3o (current, geo_json)",
            (ApiNaming::Current, false) => "h3o (current)",
            (ApiNaming::Legacy, true) => "h3o (legacy, geo_json)",
            (ApiNaming::Legacy, false) => "h3o (legacy)",
        }
    }

    fn capabilities(&self) -> Capabilities {
        let current = self.naming == ApiNaming::Current;
        Capabilities {
            latlng_to_cell: current,
            geo_to_h3: !current,
            cell_to_boundary: current,
            h3_to_geo_boundary: !current,
            geo_json_boundary: self.geo_json,
        }
    }

    fn latlng_to_cell(&self, lat: f64, lng: f64, resolution: u8) -> Result<u64, GridError> {
        match self.naming {
            ApiNaming::Current => Self::to_cell(lat, lng, resolution),
            ApiNaming::Legacy => Err(GridError::Unavailable("latlng_to_cell")),
        }
    }

    fn geo_to_h3(&self, lat: f64, lng: f64, resolution: u8) -> Result<u64, GridError> {
        match self.naming {
            ApiNaming::Legacy => Self::to_cell(lat, lng, resolution),
            ApiNaming::Current => Err(GridError::Unavailable("geo_to_h3")),
        }
    }

    fn cell_to_boundary(&self, cell: u64, geo_json: bool) -> Result<Vec<(f64, f64)>, GridError> {
        match self.naming {
            ApiNaming::Current => self.boundary(cell, geo_json),
            ApiNaming::Legacy => Err(GridError::Unavailable("cell_to_boundary")),
        }
    }

    fn h3_to_geo_boundary(&self, cell: u64, geo_json: bool) -> Result<Vec<(f64, f64)>, GridError> {
        match self.naming {
            ApiNaming::Legacy => self.boundary(cell, geo_json),
            ApiNaming::Current => Err(GridError::Unavailable("h3_to_geo_boundary")),
        }
    }
}

/// Validates WGS84 degrees before handing them to `h3o`, which accepts any
/// finite value and would silently wrap out-of-range input.
fn checked_latlng(lat: f64, lng: f64) -> Result<LatLng, GridError> {
    let reject = |reason: &str| GridError::CellMapping {
        lat,
        lng,
        reason: reason.to_string(),
    };

    if !lat.is_finite() || !lng.is_finite() {
        return Err(reject("non-finite coordinate"));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(reject("latitude out of range"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(reject("longitude out of range"));
    }

    LatLng::new(lat, lng).map_err(|e| reject(&e.to_string()))
}
