#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hexagonal grid index adapter.
//!
//! Binds once to whichever naming scheme an [`IndexBackend`] provides and
//! exposes a single stable contract on top of it:
//!
//! - [`GridIndex::point_to_cell`] maps a `(lat, lng)` pair to a [`CellId`].
//! - [`GridIndex::cell_to_boundary`] returns the cell's ring as
//!   [`LngLat`] vertices, swapping backends that only produce `(lat, lng)`.
//!
//! The process-wide binding ([`global`] / [`install`]) is written once and
//! read-only afterwards.

pub mod backend;
pub mod h3o_backend;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

pub use backend::{Capabilities, IndexBackend};
pub use h3o_backend::{ApiNaming, H3oBackend};

/// Default grid resolution (~0.1 km² cells).
pub const DEFAULT_RESOLUTION: u8 = 9;

/// Finest resolution the grid supports.
pub const MAX_RESOLUTION: u8 = 15;

/// Errors that can occur in the grid adapter.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The backend provides neither point-to-cell naming scheme.
    #[error("Unsupported index revision: {backend} provides neither latlng_to_cell nor geo_to_h3")]
    UnsupportedIndexRevision {
        /// Name of the backend that was inspected.
        backend: String,
    },

    /// Resolution outside the grid's supported range.
    #[error("Invalid grid resolution {0} (expected 0..={MAX_RESOLUTION})")]
    InvalidResolution(u8),

    /// Coordinates could not be mapped to a cell.
    #[error("Cell mapping failed for lat={lat}, lng={lng}: {reason}")]
    CellMapping {
        /// Latitude that was rejected.
        lat: f64,
        /// Longitude that was rejected.
        lng: f64,
        /// Description of what went wrong.
        reason: String,
    },

    /// A cell boundary could not be produced.
    #[error("Boundary mapping failed for cell {cell}: {reason}")]
    BoundaryMapping {
        /// The offending cell, as hex.
        cell: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// A backend function was called that the backend does not provide.
    #[error("Grid function not available: {0}")]
    Unavailable(&'static str),
}

/// Opaque hexagonal cell identifier.
///
/// Displays and parses as the lowercase hexadecimal string the rendering
/// layer uses as `h3_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(u64);

impl CellId {
    /// Returns the raw 64-bit index.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for CellId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s.trim(), 16).map(Self)
    }
}

/// A boundary vertex, always in `(lng, lat)` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    /// Longitude.
    pub lng: f64,
    /// Latitude.
    pub lat: f64,
}

/// Validated grid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution(u8);

impl Resolution {
    /// Validates a resolution.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidResolution`] if `value` exceeds
    /// [`MAX_RESOLUTION`].
    pub fn new(value: u8) -> Result<Self, GridError> {
        if value > MAX_RESOLUTION {
            return Err(GridError::InvalidResolution(value));
        }
        Ok(Self(value))
    }

    /// Returns the numeric resolution.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self(DEFAULT_RESOLUTION)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which naming scheme the adapter bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRevision {
    /// `latlng_to_cell` / `cell_to_boundary`.
    Current,
    /// `geo_to_h3` / `h3_to_geo_boundary`.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryBinding {
    Current { geo_json: bool },
    Legacy { geo_json: bool },
    Missing,
}

/// A grid backend bound to one naming scheme.
///
/// The binding is resolved once in [`GridIndex::bind`] and never
/// re-checked per call.
#[derive(Clone)]
pub struct GridIndex {
    backend: Arc<dyn IndexBackend>,
    revision: IndexRevision,
    boundary: BoundaryBinding,
}

impl fmt::Debug for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridIndex")
            .field("backend", &self.backend.name())
            .field("revision", &self.revision)
            .field("boundary", &self.boundary)
            .finish()
    }
}

impl GridIndex {
    /// Probes `backend` and binds to the naming scheme it provides,
    /// preferring the current scheme when both are present.
    ///
    /// A backend without any boundary function still binds; every boundary
    /// call then fails with [`GridError::Unavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::UnsupportedIndexRevision`] if the backend
    /// provides neither point-to-cell function.
    pub fn bind(backend: Arc<dyn IndexBackend>) -> Result<Self, GridError> {
        let caps = backend.capabilities();

        let revision = if caps.latlng_to_cell {
            IndexRevision::Current
        } else if caps.geo_to_h3 {
            IndexRevision::Legacy
        } else {
            return Err(GridError::UnsupportedIndexRevision {
                backend: backend.name().to_string(),
            });
        };

        let geo_json = caps.geo_json_boundary;
        let boundary = if caps.cell_to_boundary {
            BoundaryBinding::Current { geo_json }
        } else if caps.h3_to_geo_boundary {
            BoundaryBinding::Legacy { geo_json }
        } else {
            log::warn!(
                "Grid backend {} provides no boundary function; polygons will be skipped",
                backend.name()
            );
            BoundaryBinding::Missing
        };

        log::info!(
            "Bound grid backend {} ({revision:?} naming, boundary {boundary:?})",
            backend.name()
        );

        Ok(Self {
            backend,
            revision,
            boundary,
        })
    }

    /// The naming scheme used for point-to-cell.
    #[must_use]
    pub const fn revision(&self) -> IndexRevision {
        self.revision
    }

    /// Name of the bound backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Maps a coordinate to its cell at `resolution`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::CellMapping`] if the backend rejects the
    /// coordinates.
    pub fn point_to_cell(
        &self,
        lat: f64,
        lng: f64,
        resolution: Resolution,
    ) -> Result<CellId, GridError> {
        let raw = match self.revision {
            IndexRevision::Current => self.backend.latlng_to_cell(lat, lng, resolution.value()),
            IndexRevision::Legacy => self.backend.geo_to_h3(lat, lng, resolution.value()),
        }?;
        Ok(CellId(raw))
    }

    /// Returns the cell's boundary ring in `(lng, lat)` order.
    ///
    /// The ring is returned as the backend produces it: open (first vertex
    /// not repeated) and in native winding order.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::BoundaryMapping`] if the cell is invalid, or
    /// [`GridError::Unavailable`] if the backend has no boundary function.
    pub fn cell_to_boundary(&self, cell: CellId) -> Result<Vec<LngLat>, GridError> {
        let (native, geo_json) = match self.boundary {
            BoundaryBinding::Current { geo_json } => {
                (self.backend.cell_to_boundary(cell.0, geo_json)?, geo_json)
            }
            BoundaryBinding::Legacy { geo_json } => {
                (self.backend.h3_to_geo_boundary(cell.0, geo_json)?, geo_json)
            }
            BoundaryBinding::Missing => return Err(GridError::Unavailable("cell boundary")),
        };

        Ok(native
            .into_iter()
            .map(|(a, b)| {
                if geo_json {
                    LngLat { lng: a, lat: b }
                } else {
                    LngLat { lng: b, lat: a }
                }
            })
            .collect())
    }
}

static GLOBAL_INDEX: OnceLock<GridIndex> = OnceLock::new();

/// Binds `backend` as the process-wide grid index.
///
/// Only the first successful call binds; later calls return the existing
/// binding and ignore `backend`.
///
/// # Errors
///
/// Returns [`GridError::UnsupportedIndexRevision`] if nothing is bound yet
/// and `backend` cannot be bound.
pub fn install(backend: Arc<dyn IndexBackend>) -> Result<&'static GridIndex, GridError> {
    if let Some(index) = GLOBAL_INDEX.get() {
        return Ok(index);
    }
    let index = GridIndex::bind(backend)?;
    Ok(GLOBAL_INDEX.get_or_init(|| index))
}

/// Returns the process-wide grid index, binding [`H3oBackend::current`] on
/// first use.
///
/// # Errors
///
/// Returns [`GridError::UnsupportedIndexRevision`] if the default backend
/// cannot be bound.
pub fn global() -> Result<&'static GridIndex, GridError> {
    install(Arc::new(H3oBackend::current()))
}
