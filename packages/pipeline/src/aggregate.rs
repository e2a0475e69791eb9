//! Per-cell aggregation of endpoint events.

use std::collections::BTreeMap;

use trip_demand_grid::{CellId, GridIndex, Resolution};
use trip_demand_trace_models::{DemandRow, EndpointEvent};

use crate::report::{FailureKind, RunReport};

/// Number of endpoint events that fell into one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCount {
    /// The cell.
    pub cell: CellId,
    /// Contributing events, always at least 1.
    pub count: u64,
}

/// Per-cell event counts for one endpoint role at one resolution.
///
/// Each cell appears at most once. Rows are ordered by cell id, which is
/// deterministic but carries no meaning; use [`DemandAggregate::top`] for
/// presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandAggregate {
    cells: Vec<CellCount>,
}

impl DemandAggregate {
    /// All rows.
    #[must_use]
    pub fn cells(&self) -> &[CellCount] {
        &self.cells
    }

    /// Number of distinct cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no event could be mapped to a cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|c| c.count).sum()
    }

    /// Smallest and largest count, for colour scales.
    #[must_use]
    pub fn count_range(&self) -> Option<(u64, u64)> {
        let min = self.cells.iter().map(|c| c.count).min()?;
        let max = self.cells.iter().map(|c| c.count).max()?;
        Some((min, max))
    }

    /// The `n` busiest cells, highest count first (ties by cell id).
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<CellCount> {
        let mut sorted = self.cells.clone();
        sorted.sort_by(|a, b| b.count.cmp(&a.count).then(a.cell.cmp(&b.cell)));
        sorted.truncate(n);
        sorted
    }

    /// Export rows for the rendering layer.
    #[must_use]
    pub fn to_rows(&self) -> Vec<DemandRow> {
        self.cells.iter().map(to_row).collect()
    }
}

/// Converts a count to its export row.
#[must_use]
pub fn to_row(cell: &CellCount) -> DemandRow {
    DemandRow {
        h3_index: cell.cell.to_string(),
        count: cell.count,
    }
}

/// Maps every event to its cell at `resolution` and counts events per
/// cell.
///
/// Events whose coordinates the grid rejects are skipped and recorded in
/// `report`. If every event is skipped the result is an empty aggregate,
/// not an error.
#[must_use]
pub fn aggregate_events(
    events: &[EndpointEvent],
    grid: &GridIndex,
    resolution: Resolution,
    report: &mut RunReport,
) -> DemandAggregate {
    let mut counts: BTreeMap<CellId, u64> = BTreeMap::new();

    for event in events {
        match grid.point_to_cell(event.lat, event.lng, resolution) {
            Ok(cell) => *counts.entry(cell).or_insert(0) += 1,
            Err(e) => report.record(FailureKind::CellMapping, &e),
        }
    }

    let cells: Vec<CellCount> = counts
        .into_iter()
        .map(|(cell, count)| CellCount { cell, count })
        .collect();

    log::info!(
        "Aggregated {} events into {} cells at resolution {resolution}",
        events.len(),
        cells.len()
    );

    DemandAggregate { cells }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trip_demand_grid::H3oBackend;
    use trip_demand_trace_models::EndpointRole;

    use super::*;

    fn grid() -> GridIndex {
        GridIndex::bind(Arc::new(H3oBackend::current())).unwrap()
    }

    fn event(id: &str, lat: f64, lng: f64) -> EndpointEvent {
        EndpointEvent {
            trip_id: id.to_string(),
            lat,
            lng,
            role: EndpointRole::Pickup,
        }
    }

    #[test]
    fn counts_events_per_cell() {
        let events = vec![
            event("a", 51.1280, 71.4300),
            event("b", 51.1280, 71.4300),
            event("c", 51.1280, 71.4300),
            event("d", 43.2380, 76.9450),
        ];
        let mut report = RunReport::new();

        let agg = aggregate_events(&events, &grid(), Resolution::default(), &mut report);

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.total(), 4);
        assert_eq!(agg.top(1)[0].count, 3);
        assert_eq!(agg.count_range(), Some((1, 3)));
        assert!(!report.has_failures());
    }

    #[test]
    fn skips_unmappable_rows() {
        let events = vec![
            event("a", 51.128, 71.43),
            event("b", 200.0, 71.43),
            event("c", 51.128, 500.0),
        ];
        let mut report = RunReport::new();

        let agg = aggregate_events(&events, &grid(), Resolution::default(), &mut report);

        assert_eq!(agg.total(), 1);
        assert!(agg.total() <= events.len() as u64);
        assert_eq!(report.cell_mapping_failures(), 2);
        assert!(agg.cells().iter().all(|c| c.count >= 1));
    }

    #[test]
    fn all_rows_unmappable_yields_empty_aggregate() {
        let events = vec![event("a", 91.0, 0.0), event("b", -95.0, 0.0)];
        let mut report = RunReport::new();

        let agg = aggregate_events(&events, &grid(), Resolution::default(), &mut report);

        assert!(agg.is_empty());
        assert_eq!(agg.count_range(), None);
        assert!(agg.to_rows().is_empty());
        assert_eq!(report.cell_mapping_failures(), 2);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let events: Vec<EndpointEvent> = (0..200)
            .map(|i| {
                let offset = f64::from(i) * 0.0007;
                event(&i.to_string(), 51.10 + offset, 71.40 + offset)
            })
            .collect();
        let grid = grid();

        let first = aggregate_events(&events, &grid, Resolution::default(), &mut RunReport::new());
        let second = aggregate_events(&events, &grid, Resolution::default(), &mut RunReport::new());

        assert_eq!(first, second);
        assert_eq!(first.total(), 200);
    }

    #[test]
    fn cell_ids_are_unique() {
        let events: Vec<EndpointEvent> = (0..100)
            .map(|i| event("x", 51.1 + f64::from(i % 5) * 0.01, 71.4))
            .collect();

        let agg = aggregate_events(&events, &grid(), Resolution::default(), &mut RunReport::new());

        let mut ids: Vec<CellId> = agg.cells().iter().map(|c| c.cell).collect();
        ids.dedup();
        assert_eq!(ids.len(), agg.len());
        assert_eq!(agg.len(), 5);
    }

    #[test]
    fn rows_export_hex_index() {
        let mut report = RunReport::new();
        let agg = aggregate_events(
            &[event("a", 51.128, 71.43)],
            &grid(),
            Resolution::default(),
            &mut report,
        );

        let rows = agg.to_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].h3_index, agg.cells()[0].cell.to_string());
        assert_eq!(rows[0].h3_index.len(), 15);
    }
}
