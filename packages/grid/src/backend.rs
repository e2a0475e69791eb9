//! Backend capability trait for hexagonal grid libraries.
//!
//! Two incompatible function-naming schemes exist for the same hex grid:
//! the current one (`latlng_to_cell` / `cell_to_boundary`) and the legacy
//! one (`geo_to_h3` / `h3_to_geo_boundary`). A backend advertises which of
//! these it provides through [`Capabilities`]; calling a function it does
//! not provide returns [`GridError::Unavailable`].
//!
//! Boundary functions return vertices in the backend's native order:
//! `(lng, lat)` when called with `geo_json = true`, `(lat, lng)` otherwise.

use crate::GridError;

/// The set of grid functions a backend provides.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Current point-to-cell function.
    pub latlng_to_cell: bool,
    /// Legacy point-to-cell function.
    pub geo_to_h3: bool,
    /// Current boundary function.
    pub cell_to_boundary: bool,
    /// Legacy boundary function.
    pub h3_to_geo_boundary: bool,
    /// Boundary functions accept `geo_json = true` and return `(lng, lat)`.
    pub geo_json_boundary: bool,
}

/// A hexagonal grid library as seen by the adapter.
///
/// Every function has a default implementation that reports the function
/// as unavailable, so a backend only overrides what it actually provides.
pub trait IndexBackend: Send + Sync {
    /// Human-readable backend name used in log lines and errors.
    fn name(&self) -> &str;

    /// Which functions this backend provides.
    fn capabilities(&self) -> Capabilities;

    /// Current-scheme point-to-cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Unavailable`] if not provided, or
    /// [`GridError::CellMapping`] if the coordinates cannot be indexed.
    fn latlng_to_cell(&self, _lat: f64, _lng: f64, _resolution: u8) -> Result<u64, GridError> {
        Err(GridError::Unavailable("latlng_to_cell"))
    }

    /// Legacy-scheme point-to-cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Unavailable`] if not provided, or
    /// [`GridError::CellMapping`] if the coordinates cannot be indexed.
    fn geo_to_h3(&self, _lat: f64, _lng: f64, _resolution: u8) -> Result<u64, GridError> {
        Err(GridError::Unavailable("geo_to_h3"))
    }

    /// Current-scheme cell boundary in native vertex order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Unavailable`] if not provided, or
    /// [`GridError::BoundaryMapping`] if the cell is not valid.
    fn cell_to_boundary(&self, _cell: u64, _geo_json: bool) -> Result<Vec<(f64, f64)>, GridError> {
        Err(GridError::Unavailable("cell_to_boundary"))
    }

    /// Legacy-scheme cell boundary in native vertex order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Unavailable`] if not provided, or
    /// [`GridError::BoundaryMapping`] if the cell is not valid.
    fn h3_to_geo_boundary(
        &self,
        _cell: u64,
        _geo_json: bool,
    ) -> Result<Vec<(f64, f64)>, GridError> {
        Err(GridError::Unavailable("h3_to_geo_boundary"))
    }
}
