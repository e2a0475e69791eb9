//! Serialization of the pipeline's exports.
//!
//! Demand and segment rows go out as CSV or JSON arrays; boundary features
//! go out as a `GeoJSON` `FeatureCollection`.

use std::io::Write;

use serde::Serialize;
use trip_demand_trace_models::ExportRow;

use crate::PipelineError;
use crate::boundary::{BoundaryFeature, feature_collection};

/// Export encodings for tabular rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// Comma-separated with a header row.
    Csv,
    /// Pretty-printed JSON array.
    Json,
}

/// Writes `rows` to `writer` in `format`.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`], [`PipelineError::Json`] or
/// [`PipelineError::Io`] if encoding or writing fails.
pub fn write_rows<T: ExportRow>(
    rows: &[T],
    format: RowFormat,
    writer: impl Write,
) -> Result<(), PipelineError> {
    match format {
        RowFormat::Csv => write_csv(rows, writer),
        RowFormat::Json => write_json(rows, writer),
    }
}

/// Writes `rows` as CSV with a header row. An empty slice still writes the
/// header.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if a row cannot be encoded or written.
pub fn write_csv<T: ExportRow>(rows: &[T], writer: impl Write) -> Result<(), PipelineError> {
    let mut csv = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv.write_record(T::COLUMNS)?;
    }
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON followed by a newline.
///
/// # Errors
///
/// Returns [`PipelineError::Json`] or [`PipelineError::Io`] if encoding or
/// writing fails.
pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    mut writer: impl Write,
) -> Result<(), PipelineError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Writes `features` as a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// See [`write_json`].
pub fn write_geojson(features: &[BoundaryFeature], writer: impl Write) -> Result<(), PipelineError> {
    write_json(&feature_collection(features), writer)
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufWriter};

    use trip_demand_trace_models::{DemandRow, SegmentRow};

    use super::*;

    /// Rejects every write, like a full disk.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("no space left on device"))
        }
    }

    #[test]
    fn demand_rows_as_csv() {
        let rows = vec![
            DemandRow {
                h3_index: "8928308280fffff".to_string(),
                count: 3,
            },
            DemandRow {
                h3_index: "8928308283bffff".to_string(),
                count: 1,
            },
        ];
        let mut out = Vec::new();

        write_rows(&rows, RowFormat::Csv, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "h3_index,count\n8928308280fffff,3\n8928308283bffff,1\n"
        );
    }

    #[test]
    fn segment_rows_as_json() {
        let rows = vec![SegmentRow {
            randomized_id: "A".to_string(),
            lat_start: 0.0,
            lng_start: 0.0,
            lat_end: 1.0,
            lng_end: 1.5,
        }];
        let mut out = Vec::new();

        write_rows(&rows, RowFormat::Json, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["randomized_id"], "A");
        assert!((value[0]["lng_end"].as_f64().unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_geojson_is_well_formed() {
        let mut out = Vec::new();

        write_geojson(&[], &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn empty_rows_as_csv_write_header() {
        let mut out = Vec::new();
        write_csv::<DemandRow>(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "h3_index,count\n");

        let mut out = Vec::new();
        write_rows::<SegmentRow>(&[], RowFormat::Csv, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "randomized_id,lat_start,lng_start,lat_end,lng_end\n"
        );
    }

    #[test]
    fn buffered_json_surfaces_write_failure() {
        let result = write_geojson(&[], BufWriter::new(FullDisk));
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn buffered_csv_surfaces_write_failure() {
        let rows = vec![DemandRow {
            h3_index: "8928308280fffff".to_string(),
            count: 3,
        }];
        let result = write_csv(&rows, BufWriter::new(FullDisk));
        assert!(result.is_err());
    }
}
