//! Start→finish segment table.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use trip_demand_trace_models::{Position, Segment, SegmentRow};

use crate::PipelineError;
use crate::extract::Endpoints;

/// Fallback map centre (Astana) when the table has no usable mean.
pub const DEFAULT_MAP_CENTER: Position = Position {
    lat: 51.12,
    lng: 71.43,
};

/// One straight chord per trip, in first-seen trip order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl SegmentTable {
    /// All segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the table has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Trip ids in table order.
    #[must_use]
    pub fn trip_ids(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.trip_id.as_str()).collect()
    }

    /// Mean start position, or `None` if empty or not finite.
    #[must_use]
    pub fn mean_start(&self) -> Option<Position> {
        if self.segments.is_empty() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.segments.len() as f64;
        let lat = self.segments.iter().map(|s| s.start.lat).sum::<f64>() / n;
        let lng = self.segments.iter().map(|s| s.start.lng).sum::<f64>() / n;

        (lat.is_finite() && lng.is_finite()).then_some(Position { lat, lng })
    }

    /// Map centre for rendering: [`Self::mean_start`] or
    /// [`DEFAULT_MAP_CENTER`].
    #[must_use]
    pub fn map_center(&self) -> Position {
        self.mean_start().unwrap_or(DEFAULT_MAP_CENTER)
    }

    /// Export rows for the rendering layer.
    #[must_use]
    pub fn to_rows(&self) -> Vec<SegmentRow> {
        self.segments.iter().map(SegmentRow::from).collect()
    }
}

/// Joins pickups and dropoffs on trip id, in pickup order, keeping at most
/// `limit` rows.
///
/// The limit is a display cap applied after the join; it takes the first
/// rows, it does not sample.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if both endpoint tables are empty.
pub fn build_segments(
    endpoints: &Endpoints,
    limit: Option<NonZeroUsize>,
) -> Result<SegmentTable, PipelineError> {
    if endpoints.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let dropoffs: BTreeMap<&str, Position> = endpoints
        .dropoffs
        .iter()
        .map(|d| (d.trip_id.as_str(), d.position()))
        .collect();

    let mut segments: Vec<Segment> = endpoints
        .pickups
        .iter()
        .filter_map(|pickup| {
            let Some(end) = dropoffs.get(pickup.trip_id.as_str()) else {
                log::debug!("Trip {} has no dropoff; dropped from join", pickup.trip_id);
                return None;
            };
            Some(Segment {
                trip_id: pickup.trip_id.clone(),
                start: pickup.position(),
                end: *end,
            })
        })
        .collect();

    let joined = segments.len();
    if let Some(limit) = limit {
        segments.truncate(limit.get());
    }

    log::info!(
        "Built {} segments ({joined} joined, limit {})",
        segments.len(),
        limit.map_or_else(|| "none".to_string(), |l| l.to_string())
    );

    Ok(SegmentTable { segments })
}

#[cfg(test)]
mod tests {
    use trip_demand_trace_models::{EndpointRole, TracePoint};

    use super::*;
    use crate::extract::extract_endpoints;

    fn three_trips() -> Endpoints {
        extract_endpoints(&[
            TracePoint::new("C", 10.0, 10.0),
            TracePoint::new("A", 0.0, 0.0),
            TracePoint::new("C", 11.0, 11.0),
            TracePoint::new("B", 2.0, 2.0),
            TracePoint::new("A", 1.0, 1.0),
        ])
    }

    #[test]
    fn joins_every_trip() {
        let endpoints = extract_endpoints(&[
            TracePoint::new("A", 0.0, 0.0),
            TracePoint::new("A", 1.0, 1.0),
            TracePoint::new("B", 2.0, 2.0),
        ]);

        let table = build_segments(&endpoints, None).unwrap();

        assert_eq!(
            table.segments(),
            &[
                Segment {
                    trip_id: "A".to_string(),
                    start: Position { lat: 0.0, lng: 0.0 },
                    end: Position { lat: 1.0, lng: 1.0 },
                },
                Segment {
                    trip_id: "B".to_string(),
                    start: Position { lat: 2.0, lng: 2.0 },
                    end: Position { lat: 2.0, lng: 2.0 },
                },
            ]
        );
    }

    #[test]
    fn limit_keeps_first_seen_trips() {
        let endpoints = three_trips();

        let one = build_segments(&endpoints, NonZeroUsize::new(1)).unwrap();
        assert_eq!(one.trip_ids(), vec!["C"]);

        let two = build_segments(&endpoints, NonZeroUsize::new(2)).unwrap();
        assert_eq!(two.trip_ids(), vec!["C", "A"]);

        let many = build_segments(&endpoints, NonZeroUsize::new(100)).unwrap();
        assert_eq!(many.trip_ids(), vec!["C", "A", "B"]);
    }

    #[test]
    fn empty_endpoints_is_empty_input() {
        let err = build_segments(&Endpoints::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        assert!(err.is_recoverable());
    }

    #[test]
    fn trip_without_dropoff_is_dropped() {
        let mut endpoints = three_trips();
        endpoints.dropoffs.retain(|d| d.trip_id != "A");
        assert!(endpoints.dropoffs.iter().all(|d| d.role == EndpointRole::Dropoff));

        let table = build_segments(&endpoints, None).unwrap();
        assert_eq!(table.trip_ids(), vec!["C", "B"]);
    }

    #[test]
    fn map_center_uses_mean_start() {
        let table = build_segments(&three_trips(), None).unwrap();
        let center = table.map_center();
        assert!((center.lat - 4.0).abs() < 1e-9);
        assert!((center.lng - 4.0).abs() < 1e-9);
        assert_eq!(SegmentTable::default().map_center(), DEFAULT_MAP_CENTER);
    }

    #[test]
    fn rows_use_export_columns() {
        let table = build_segments(&three_trips(), NonZeroUsize::new(1)).unwrap();
        let rows = table.to_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].randomized_id, "C");
        assert!((rows[0].lat_start - 10.0).abs() < f64::EPSILON);
        assert!((rows[0].lng_end - 11.0).abs() < f64::EPSILON);
    }
}
