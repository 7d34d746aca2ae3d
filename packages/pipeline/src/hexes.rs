//! Hex cell aggregation stage (event-driven path).
//!
//! Filters editorial pseudo-records, resolves each remaining incident to
//! its hex cell, and feeds the order-independent accumulator. Records
//! without usable coordinates are counted in the unmapped diagnostic,
//! never dropped.

use h3o::Resolution;
use incident_grid_aggregate::{Accumulator, Diagnostics, RawAggregate};
use incident_grid_models::{IncidentRecord, SpatialKey};

use crate::config::ExclusionFilter;

/// Aggregates incidents into per-hex-cell subtype groups at one
/// resolution.
#[must_use]
pub fn aggregate_cells(
    incidents: &[IncidentRecord],
    filter: &ExclusionFilter,
    resolution: Resolution,
) -> (Vec<RawAggregate>, Diagnostics) {
    let mut accumulator = Accumulator::new();

    for incident in incidents {
        if filter.is_excluded(&incident.offence_type) {
            accumulator.record_excluded();
            continue;
        }
        let cell = match (incident.latitude, incident.longitude) {
            (Some(lat), Some(lon)) => {
                incident_grid_spatial::cell_for_point(lat, lon, resolution).ok()
            }
            _ => None,
        };
        match cell {
            Some(cell) => {
                accumulator.record(SpatialKey::Cell(cell.to_string()), &incident.offence_type);
            }
            None => accumulator.record_unmapped(),
        }
    }

    accumulator.finish()
}
