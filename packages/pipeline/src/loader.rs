//! Trace dataset loader.
//!
//! Reads a GPS trace dataset as delimited text first and falls back to a
//! columnar (Parquet) read through `DuckDB` if that fails. Column presence
//! is the only schema check: `randomized_id`, `lat` and `lng` are
//! required, `alt`, `spd` and `azm` are optional.
//!
//! Rows with a missing trip id or a missing/non-finite coordinate are
//! dropped, never repaired.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use trip_demand_trace_models::TracePoint;

use crate::PipelineError;

/// Trip identifier column.
pub const TRIP_ID_COLUMN: &str = "randomized_id";
/// Latitude column.
pub const LAT_COLUMN: &str = "lat";
/// Longitude column.
pub const LNG_COLUMN: &str = "lng";
/// Optional altitude column.
pub const ALT_COLUMN: &str = "alt";
/// Optional speed column.
pub const SPD_COLUMN: &str = "spd";
/// Optional heading column.
pub const AZM_COLUMN: &str = "azm";

const REQUIRED_COLUMNS: [&str; 3] = [TRIP_ID_COLUMN, LAT_COLUMN, LNG_COLUMN];
const OPTIONAL_COLUMNS: [&str; 3] = [ALT_COLUMN, SPD_COLUMN, AZM_COLUMN];

/// A raw row as read from either format, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawTraceRecord {
    #[serde(default)]
    randomized_id: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    alt: Option<f64>,
    #[serde(default)]
    spd: Option<f64>,
    #[serde(default)]
    azm: Option<f64>,
}

impl RawTraceRecord {
    fn into_point(self) -> Option<TracePoint> {
        let trip_id = self.randomized_id.filter(|id| !id.trim().is_empty())?;
        let lat = self.lat.filter(|v| v.is_finite())?;
        let lng = self.lng.filter(|v| v.is_finite())?;

        Some(TracePoint {
            trip_id,
            lat,
            lng,
            altitude: self.alt,
            speed: self.spd,
            heading: self.azm,
        })
    }
}

/// Why a single format attempt failed.
#[derive(Debug, thiserror::Error)]
enum FormatError {
    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Columnar(#[from] duckdb::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
}

/// Loads trace points from `path`, in file order.
///
/// # Errors
///
/// * [`PipelineError::DatasetUnreadable`] if the path does not exist or
///   neither the delimited nor the columnar parse succeeds.
/// * [`PipelineError::EmptyDataset`] if the dataset has no rows, or no
///   rows survive dropping missing coordinates.
pub fn load_traces(path: &Path) -> Result<Vec<TracePoint>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::DatasetUnreadable {
            path: path.display().to_string(),
            delimited: "file not found".to_string(),
            columnar: "not attempted".to_string(),
        });
    }

    let raw = match read_delimited(path) {
        Ok(rows) => {
            log::info!(
                "Read {} rows from delimited dataset {}",
                rows.len(),
                path.display()
            );
            rows
        }
        Err(delimited) => {
            log::debug!(
                "Delimited read of {} failed ({delimited}), trying columnar",
                path.display()
            );
            match read_columnar(path) {
                Ok(rows) => {
                    log::info!(
                        "Read {} rows from columnar dataset {}",
                        rows.len(),
                        path.display()
                    );
                    rows
                }
                Err(columnar) => {
                    return Err(PipelineError::DatasetUnreadable {
                        path: path.display().to_string(),
                        delimited: delimited.to_string(),
                        columnar: columnar.to_string(),
                    });
                }
            }
        }
    };

    let total = raw.len();
    if total == 0 {
        log::warn!("Dataset {} has no rows", path.display());
        return Err(PipelineError::EmptyDataset {
            path: path.display().to_string(),
        });
    }

    let points: Vec<TracePoint> = raw
        .into_iter()
        .filter_map(RawTraceRecord::into_point)
        .collect();

    let dropped = total - points.len();
    log::info!(
        "Dropped {dropped} of {total} rows with missing trip id or coordinates; {} remain",
        points.len()
    );

    if points.is_empty() {
        log::warn!(
            "Dataset {} had {total} rows but none had usable coordinates",
            path.display()
        );
        return Err(PipelineError::EmptyDataset {
            path: path.display().to_string(),
        });
    }

    Ok(points)
}

fn missing_columns(present: impl Fn(&str) -> bool) -> Result<(), FormatError> {
    let missing: Vec<&'static str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present(c))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FormatError::MissingColumns(missing))
    }
}

fn read_delimited(path: &Path) -> Result<Vec<RawTraceRecord>, FormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    missing_columns(|c| headers.iter().any(|h| h == c))?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawTraceRecord>() {
        rows.push(result?);
    }
    Ok(rows)
}

fn read_columnar(path: &Path) -> Result<Vec<RawTraceRecord>, FormatError> {
    let conn = duckdb::Connection::open_in_memory()?;
    let source = format!(
        "read_parquet('{}')",
        path.display().to_string().replace('\'', "''")
    );

    let columns: BTreeSet<String> = {
        let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {source}"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        names
    };
    missing_columns(|c| columns.contains(c))?;

    let optional: Vec<String> = OPTIONAL_COLUMNS
        .iter()
        .map(|c| {
            if columns.contains(*c) {
                format!("CAST(\"{c}\" AS DOUBLE)")
            } else {
                "CAST(NULL AS DOUBLE)".to_string()
            }
        })
        .collect();

    let query = format!(
        "SELECT CAST(\"{TRIP_ID_COLUMN}\" AS VARCHAR), \
                CAST(\"{LAT_COLUMN}\" AS DOUBLE), \
                CAST(\"{LNG_COLUMN}\" AS DOUBLE), \
                {} \
         FROM {source}",
        optional.join(", ")
    );

    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query([])?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        records.push(RawTraceRecord {
            randomized_id: row.get(0)?,
            lat: row.get(1)?,
            lng: row.get(2)?,
            alt: row.get(3)?,
            spd: row.get(4)?,
            azm: row.get(5)?,
        });
    }

    Ok(records)
}
