#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trip demand pipeline.
//!
//! Loads GPS traces, extracts each trip's pickup and dropoff, counts them
//! per hexagonal grid cell, materializes cell polygons for rendering, and
//! builds a start→finish segment table. [`Pipeline`] ties the stages
//! together and memoizes results per dataset.

pub mod aggregate;
pub mod boundary;
pub mod cache;
pub mod config;
pub mod export;
pub mod extract;
pub mod loader;
pub mod report;
pub mod segments;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use geojson::FeatureCollection;
use trip_demand_grid::{GridError, GridIndex, Resolution};
use trip_demand_trace_models::EndpointRole;

use crate::aggregate::{DemandAggregate, aggregate_events};
use crate::boundary::{BoundaryFeature, feature_collection, materialize};
use crate::cache::TtlCache;
use crate::extract::{Endpoints, extract_endpoints};
use crate::loader::load_traces;
use crate::report::RunReport;
use crate::segments::{SegmentTable, build_segments};

/// Errors that can occur while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The grid index could not be bound or rejected its input.
    #[error("Grid index error: {0}")]
    Grid(#[from] GridError),

    /// Neither the delimited nor the columnar reader could parse the
    /// dataset.
    #[error("Dataset {path} is unreadable (delimited: {delimited}; columnar: {columnar})")]
    DatasetUnreadable {
        /// Dataset path.
        path: String,
        /// Why the delimited read failed.
        delimited: String,
        /// Why the columnar read failed.
        columnar: String,
    },

    /// The dataset parsed but has no usable rows.
    #[error("Dataset {path} has no rows with coordinates")]
    EmptyDataset {
        /// Dataset path.
        path: String,
    },

    /// There are no endpoints to build segments from.
    #[error("No pickups or dropoffs to build segments from")]
    EmptyInput,

    /// A configuration value is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (export write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether callers should render an empty state instead of failing.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyDataset { .. } | Self::EmptyInput)
    }
}

/// Identity of a dataset file for memoization: its path plus the size and
/// modification time at lookup, so a rewritten file misses the cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatasetKey {
    path: PathBuf,
    len: Option<u64>,
    modified: Option<SystemTime>,
}

impl DatasetKey {
    /// Reads the identity of `path`. A missing file still yields a key.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        let metadata = std::fs::metadata(path).ok();
        Self {
            path: path.to_path_buf(),
            len: metadata.as_ref().map(std::fs::Metadata::len),
            modified: metadata.and_then(|m| m.modified().ok()),
        }
    }
}

/// Pickup and dropoff aggregates of one dataset at one resolution, with
/// the failures recorded while computing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandSurface {
    /// Trip starts per cell.
    pub pickups: DemandAggregate,
    /// Trip ends per cell.
    pub dropoffs: DemandAggregate,
    /// Cell mapping failures across both roles.
    pub report: RunReport,
}

impl DemandSurface {
    /// Returns the aggregate for `role`.
    #[must_use]
    pub const fn for_role(&self, role: EndpointRole) -> &DemandAggregate {
        match role {
            EndpointRole::Pickup => &self.pickups,
            EndpointRole::Dropoff => &self.dropoffs,
        }
    }
}

/// Renderable polygons for one role.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapLayer {
    /// Which endpoints were counted.
    pub role: EndpointRole,
    /// One feature per cell whose boundary could be produced.
    pub features: Vec<BoundaryFeature>,
    /// Boundary failures for this layer.
    pub report: RunReport,
}

impl HeatmapLayer {
    /// Packages the layer as a `GeoJSON` `FeatureCollection`.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        feature_collection(&self.features)
    }
}

/// Runs the pipeline stages against a bound grid index, memoizing
/// endpoints, demand surfaces and segment tables for the configured TTL.
pub struct Pipeline {
    grid: GridIndex,
    endpoints: TtlCache<DatasetKey, Endpoints>,
    demand: TtlCache<(DatasetKey, Resolution), DemandSurface>,
    segments: TtlCache<(DatasetKey, Option<NonZeroUsize>), SegmentTable>,
}

impl Pipeline {
    /// Creates a pipeline over `grid`. A zero `cache_ttl` disables
    /// memoization.
    #[must_use]
    pub const fn new(grid: GridIndex, cache_ttl: Duration) -> Self {
        Self {
            grid,
            endpoints: TtlCache::new(cache_ttl),
            demand: TtlCache::new(cache_ttl),
            segments: TtlCache::new(cache_ttl),
        }
    }

    /// Creates a pipeline over the process-wide grid binding.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Grid`] if no supported index revision is
    /// available.
    pub fn from_global(cache_ttl: Duration) -> Result<Self, PipelineError> {
        let grid = trip_demand_grid::global()?;
        log::info!(
            "Pipeline bound to {} ({:?} revision)",
            grid.backend_name(),
            grid.revision()
        );
        Ok(Self::new(grid.clone(), cache_ttl))
    }

    /// The grid index used for every run.
    #[must_use]
    pub const fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Pickups and dropoffs of every trip in the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DatasetUnreadable`] or
    /// [`PipelineError::EmptyDataset`] from the loader.
    pub fn endpoints(&self, path: &Path) -> Result<Arc<Endpoints>, PipelineError> {
        self.endpoints.get_or_try_insert_with(&DatasetKey::of(path), || {
            let points = load_traces(path)?;
            Ok(extract_endpoints(&points))
        })
    }

    /// Pickup and dropoff aggregates at `resolution`.
    ///
    /// Rows that cannot be mapped to a cell are skipped and counted in the
    /// surface's report. An empty aggregate is not an error.
    ///
    /// # Errors
    ///
    /// See [`Self::endpoints`].
    pub fn demand_surface(
        &self,
        path: &Path,
        resolution: Resolution,
    ) -> Result<Arc<DemandSurface>, PipelineError> {
        let key = (DatasetKey::of(path), resolution);
        self.demand.get_or_try_insert_with(&key, || {
            let endpoints = self.endpoints(path)?;
            let mut report = RunReport::new();

            let pickups =
                aggregate_events(&endpoints.pickups, &self.grid, resolution, &mut report);
            let dropoffs =
                aggregate_events(&endpoints.dropoffs, &self.grid, resolution, &mut report);

            for (role, aggregate) in [
                (EndpointRole::Pickup, &pickups),
                (EndpointRole::Dropoff, &dropoffs),
            ] {
                if aggregate.is_empty() {
                    log::warn!("{role} aggregate has 0 cells: coordinates could not be mapped");
                }
            }
            report.log_summary("demand surface");

            Ok(DemandSurface {
                pickups,
                dropoffs,
                report,
            })
        })
    }

    /// Cell polygons for `role` at `resolution`.
    ///
    /// # Errors
    ///
    /// See [`Self::endpoints`].
    pub fn heatmap(
        &self,
        path: &Path,
        resolution: Resolution,
        role: EndpointRole,
    ) -> Result<HeatmapLayer, PipelineError> {
        let surface = self.demand_surface(path, resolution)?;
        let mut report = RunReport::new();

        let features = materialize(surface.for_role(role), &self.grid, &mut report);
        report.log_summary("heatmap");

        Ok(HeatmapLayer {
            role,
            features,
            report,
        })
    }

    /// Start→finish segments, capped at `limit` rows.
    ///
    /// # Errors
    ///
    /// See [`Self::endpoints`]. Also returns [`PipelineError::EmptyInput`]
    /// if there are no endpoints.
    pub fn segments(
        &self,
        path: &Path,
        limit: Option<NonZeroUsize>,
    ) -> Result<Arc<SegmentTable>, PipelineError> {
        let key = (DatasetKey::of(path), limit);
        self.segments.get_or_try_insert_with(&key, || {
            let endpoints = self.endpoints(path)?;
            build_segments(&endpoints, limit)
        })
    }

    /// Drops every memoized result.
    pub fn flush_cache(&self) {
        self.endpoints.flush();
        self.demand.flush();
        self.segments.flush();
    }
}
