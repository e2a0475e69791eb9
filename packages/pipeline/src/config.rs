//! Environment-driven pipeline configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use trip_demand_grid::Resolution;

use crate::PipelineError;

/// Dataset read when `TRIP_DEMAND_DATASET` is unset.
pub const DEFAULT_DATASET_PATH: &str = "data/geo_locations_astana_hackathon";

/// Memo lifetime when `TRIP_DEMAND_CACHE_TTL_SECS` is unset.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Settings for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Trace dataset, delimited or columnar.
    pub dataset_path: PathBuf,
    /// Grid resolution for aggregation.
    pub resolution: Resolution,
    /// Default cap on segment rows. `None` keeps all.
    pub segment_limit: Option<NonZeroUsize>,
    /// How long computed results stay memoized.
    pub cache_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            resolution: Resolution::default(),
            segment_limit: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl PipelineConfig {
    /// Reads `TRIP_DEMAND_DATASET`, `TRIP_DEMAND_RESOLUTION`,
    /// `TRIP_DEMAND_SEGMENT_LIMIT` and `TRIP_DEMAND_CACHE_TTL_SECS`,
    /// falling back to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if a variable is set but cannot be
    /// parsed, or [`PipelineError::Grid`] if the resolution is out of range.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let defaults = Self::default();

        let dataset_path = lookup("TRIP_DEMAND_DATASET")
            .filter(|p| !p.trim().is_empty())
            .map_or(defaults.dataset_path, PathBuf::from);

        let resolution = match lookup("TRIP_DEMAND_RESOLUTION") {
            Some(raw) => Resolution::new(parse_number("TRIP_DEMAND_RESOLUTION", &raw)?)?,
            None => defaults.resolution,
        };

        let segment_limit = match lookup("TRIP_DEMAND_SEGMENT_LIMIT") {
            Some(raw) => parse_limit(&raw)?,
            None => defaults.segment_limit,
        };

        let cache_ttl = match lookup("TRIP_DEMAND_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_number("TRIP_DEMAND_CACHE_TTL_SECS", &raw)?),
            None => defaults.cache_ttl,
        };

        let config = Self {
            dataset_path,
            resolution,
            segment_limit,
            cache_ttl,
        };
        log::debug!("Pipeline config: {config:?}");
        Ok(config)
    }
}

/// Parses a segment limit where `0` means no limit.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if `raw` is not a non-negative
/// integer.
pub fn parse_limit(raw: &str) -> Result<Option<NonZeroUsize>, PipelineError> {
    let n: usize = parse_number("segment limit", raw)?;
    Ok(NonZeroUsize::new(n))
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| PipelineError::Config {
        message: format!("Invalid {name} '{raw}': {e}"),
    })
}
