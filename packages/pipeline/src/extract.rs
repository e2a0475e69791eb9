//! Trip endpoint extraction.
//!
//! Partitions trace points by trip id without reordering: trips keep the
//! order in which their first point appears, and points keep file order
//! within a trip. The first point of each partition is the pickup and the
//! last point is the dropoff. No timestamp sort is performed.

use std::collections::BTreeMap;

use trip_demand_trace_models::{EndpointEvent, EndpointRole, TracePoint};

/// Pickups and dropoffs of every trip, one row each, in first-seen trip
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Endpoints {
    /// First observed position per trip.
    pub pickups: Vec<EndpointEvent>,
    /// Last observed position per trip.
    pub dropoffs: Vec<EndpointEvent>,
}

impl Endpoints {
    /// Returns the table for `role`.
    #[must_use]
    pub fn for_role(&self, role: EndpointRole) -> &[EndpointEvent] {
        match role {
            EndpointRole::Pickup => &self.pickups,
            EndpointRole::Dropoff => &self.dropoffs,
        }
    }

    /// Whether there are no trips at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pickups.is_empty() && self.dropoffs.is_empty()
    }
}

/// Extracts pickup and dropoff events from `points`.
#[must_use]
pub fn extract_endpoints(points: &[TracePoint]) -> Endpoints {
    let mut slots: BTreeMap<&str, usize> = BTreeMap::new();
    let mut trips: Vec<(&TracePoint, &TracePoint)> = Vec::new();

    for point in points {
        if let Some(&slot) = slots.get(point.trip_id.as_str()) {
            trips[slot].1 = point;
        } else {
            slots.insert(point.trip_id.as_str(), trips.len());
            trips.push((point, point));
        }
    }

    let (pickups, dropoffs): (Vec<_>, Vec<_>) = trips
        .into_iter()
        .map(|(first, last)| {
            (
                EndpointEvent::from_point(first, EndpointRole::Pickup),
                EndpointEvent::from_point(last, EndpointRole::Dropoff),
            )
        })
        .unzip();

    log::info!(
        "Extracted pickups and dropoffs for {} trips from {} points",
        pickups.len(),
        points.len()
    );

    Endpoints { pickups, dropoffs }
}
