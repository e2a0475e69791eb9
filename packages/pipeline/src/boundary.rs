//! Polygon materialization of aggregated cells.
//!
//! Turns a [`DemandAggregate`] into [`BoundaryFeature`]s and packages them
//! as a `GeoJSON` `FeatureCollection` with `h3_index` and `count`
//! properties. [`BoundaryFeature::ring`] holds the vertices exactly as the
//! grid adapter returns them: `(lng, lat)` order, native winding, open. The
//! `GeoJSON` polygon repeats the first vertex to close the ring.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use trip_demand_grid::{CellId, GridIndex, LngLat};

use crate::aggregate::DemandAggregate;
use crate::report::{FailureKind, RunReport};

/// A cell polygon with its event count.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    /// The cell.
    pub cell: CellId,
    /// Open ring of vertices in `(lng, lat)` order.
    pub ring: Vec<LngLat>,
    /// Count copied from the aggregate.
    pub count: u64,
}

impl BoundaryFeature {
    /// Converts to a `GeoJSON` polygon feature with a closed ring.
    #[must_use]
    pub fn to_feature(&self) -> Feature {
        let mut ring: Vec<Vec<f64>> = self.ring.iter().map(|v| vec![v.lng, v.lat]).collect();
        if let Some(first) = ring.first().cloned() {
            ring.push(first);
        }

        let mut properties = JsonObject::new();
        properties.insert(
            "h3_index".to_string(),
            JsonValue::from(self.cell.to_string()),
        );
        properties.insert("count".to_string(), JsonValue::from(self.count));

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Looks up the boundary of every cell in `aggregate`, in aggregate order.
///
/// Cells whose boundary fails are skipped and recorded in `report`.
#[must_use]
pub fn materialize(
    aggregate: &DemandAggregate,
    grid: &GridIndex,
    report: &mut RunReport,
) -> Vec<BoundaryFeature> {
    let features: Vec<BoundaryFeature> = aggregate
        .cells()
        .iter()
        .filter_map(|c| match grid.cell_to_boundary(c.cell) {
            Ok(ring) => Some(BoundaryFeature {
                cell: c.cell,
                ring,
                count: c.count,
            }),
            Err(e) => {
                report.record(FailureKind::BoundaryMapping, &e);
                None
            }
        })
        .collect();

    log::info!(
        "Materialized {} of {} cell boundaries",
        features.len(),
        aggregate.len()
    );

    features
}

/// Packages features as a `FeatureCollection`. An empty slice yields an
/// empty (but well-formed) collection.
#[must_use]
pub fn feature_collection(features: &[BoundaryFeature]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.iter().map(BoundaryFeature::to_feature).collect(),
        foreign_members: None,
    }
}
