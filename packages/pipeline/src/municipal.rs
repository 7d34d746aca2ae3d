//! Municipality aggregation stage (catalog-driven path).
//!
//! Resolves each incident's free-text location name against the fixed
//! municipality catalog and aggregates by municipality code. Uses the
//! same exclusion filter, classification table, and accumulator as the
//! hex path; only the spatial key resolution differs.

use std::collections::BTreeMap;

use incident_grid_aggregate::{Accumulator, Diagnostics, RawAggregate};
use incident_grid_models::{IncidentRecord, Municipality, SpatialKey};

use crate::config::ExclusionFilter;

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Aggregates incidents into per-municipality subtype groups.
///
/// Incidents whose location name matches no catalog entry count as
/// unmapped, mirroring how the hex path treats unresolvable coordinates.
#[must_use]
pub fn aggregate_municipalities(
    incidents: &[IncidentRecord],
    filter: &ExclusionFilter,
    catalog: &[Municipality],
) -> (Vec<RawAggregate>, Diagnostics) {
    let codes_by_name: BTreeMap<String, &str> = catalog
        .iter()
        .map(|m| (normalize_name(&m.name), m.code.as_str()))
        .collect();

    let mut accumulator = Accumulator::new();
    for incident in incidents {
        if filter.is_excluded(&incident.offence_type) {
            accumulator.record_excluded();
            continue;
        }
        match codes_by_name.get(&normalize_name(&incident.location_name)) {
            Some(code) => accumulator.record(
                SpatialKey::Municipality((*code).to_string()),
                &incident.offence_type,
            ),
            None => accumulator.record_unmapped(),
        }
    }

    accumulator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputsConfig, PipelineConfig, ReliabilityConfig};
    use incident_grid_aggregate::{ReliabilityThresholds, join_catalog};

    fn empty_filter() -> ExclusionFilter {
        PipelineConfig {
            inputs: InputsConfig {
                incidents: "incidents.csv".into(),
                population_grid: "grid.geojson".into(),
                municipalities: "municipalities.csv".into(),
            },
            output_dir: "out".into(),
            resolutions: vec![5],
            reliability: ReliabilityConfig {
                rate_min_population: 5000,
                display_min_population: 1000,
            },
            exclude_patterns: Vec::new(),
        }
        .exclusion_filter()
        .unwrap()
    }

    fn catalog() -> Vec<Municipality> {
        vec![
            Municipality {
                code: "091".into(),
                name: "Helsinki".into(),
                population: 650_000,
            },
            Municipality {
                code: "837".into(),
                name: "Tampere".into(),
                population: 240_000,
            },
        ]
    }

    fn incident(location: &str, offence_type: &str) -> IncidentRecord {
        IncidentRecord {
            occurred_at: "2024-03-01T12:00:00".into(),
            latitude: None,
            longitude: None,
            offence_type: offence_type.into(),
            location_name: location.into(),
            description: None,
        }
    }

    #[test]
    fn location_names_resolve_case_insensitively() {
        let incidents = vec![
            incident("HELSINKI", "theft"),
            incident(" helsinki ", "assault"),
            incident("Tampere", "fraud"),
        ];
        let (aggregates, diagnostics) =
            aggregate_municipalities(&incidents, &empty_filter(), &catalog());

        assert_eq!(aggregates.len(), 2);
        assert_eq!(diagnostics.mapped, 3);
        let helsinki = aggregates
            .iter()
            .find(|a| a.key.as_str() == "091")
            .unwrap();
        assert_eq!(helsinki.total_count, 2);
    }

    #[test]
    fn unknown_location_counts_as_unmapped() {
        let incidents = vec![
            incident("Helsinki", "theft"),
            incident("Atlantis", "theft"),
        ];
        let (aggregates, diagnostics) =
            aggregate_municipalities(&incidents, &empty_filter(), &catalog());

        let sum: u64 = aggregates.iter().map(|a| a.total_count).sum();
        assert_eq!(sum, 1);
        assert_eq!(diagnostics.unmapped, 1);
    }

    #[test]
    fn output_cardinality_always_matches_catalog() {
        let thresholds = ReliabilityThresholds {
            rate_min_population: 5000,
            display_min_population: 1000,
        };

        // No incidents at all: every municipality still appears.
        let (aggregates, _) = aggregate_municipalities(&[], &empty_filter(), &catalog());
        let units = join_catalog(&catalog(), aggregates, thresholds);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.total_count == 0));
        assert!(units.iter().all(incident_grid_models::AggregatedUnit::reconciles));
    }
}
