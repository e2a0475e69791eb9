//! Per-run accumulator for recoverable row failures.
//!
//! Rows that cannot be mapped to a cell, or cells whose boundary cannot be
//! produced, are skipped rather than aborting the run. Each category is
//! logged in full on its first occurrence only; later occurrences are
//! counted and reported in [`RunReport::log_summary`].

use trip_demand_grid::GridError;

/// Kind of recoverable row failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A coordinate could not be mapped to a grid cell.
    CellMapping,
    /// A grid cell's boundary could not be produced.
    BoundaryMapping,
}

/// Counts of recoverable failures for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    cell_mapping_failures: u64,
    boundary_mapping_failures: u64,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a skipped row, logging the error if it is the first of its
    /// kind in this run.
    pub fn record(&mut self, kind: FailureKind, error: &GridError) {
        let counter = match kind {
            FailureKind::CellMapping => &mut self.cell_mapping_failures,
            FailureKind::BoundaryMapping => &mut self.boundary_mapping_failures,
        };

        if *counter == 0 {
            log::warn!("{kind:?} failure (further occurrences in this run are only counted): {error}");
        } else {
            log::trace!("{kind:?} failure: {error}");
        }
        *counter += 1;
    }

    /// Number of rows skipped because their coordinates had no cell.
    #[must_use]
    pub const fn cell_mapping_failures(&self) -> u64 {
        self.cell_mapping_failures
    }

    /// Number of cells skipped because their boundary failed.
    #[must_use]
    pub const fn boundary_mapping_failures(&self) -> u64 {
        self.boundary_mapping_failures
    }

    /// Whether any row was skipped.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.cell_mapping_failures > 0 || self.boundary_mapping_failures > 0
    }

    /// Logs the totals for this run.
    pub fn log_summary(&self, stage: &str) {
        if self.has_failures() {
            log::warn!(
                "{stage}: skipped {} rows (cell mapping) and {} cells (boundary mapping)",
                self.cell_mapping_failures,
                self.boundary_mapping_failures
            );
        } else {
            log::info!("{stage}: no rows skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_error() -> GridError {
        GridError::CellMapping {
            lat: 200.0,
            lng: 0.0,
            reason: "latitude out of range".to_string(),
        }
    }

    #[test]
    fn counts_each_kind_separately() {
        let mut report = RunReport::new();
        report.record(FailureKind::CellMapping, &cell_error());
        report.record(FailureKind::CellMapping, &cell_error());
        report.record(
            FailureKind::BoundaryMapping,
            &GridError::Unavailable("cell boundary"),
        );

        assert_eq!(report.cell_mapping_failures(), 2);
        assert_eq!(report.boundary_mapping_failures(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn new_report_is_clean() {
        assert!(!RunReport::new().has_failures());
    }
}
