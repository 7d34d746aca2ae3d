//! Population joins and rate normalization.
//!
//! Two structurally distinct join directions, kept separate on purpose:
//!
//! - [`join_cells`] is event-driven: left-outer from the aggregated hex
//!   cells to the population-by-cell table. A cell with events but no
//!   population row keeps its events with population 0.
//! - [`join_catalog`] is catalog-driven: left-outer from the fixed
//!   municipality catalog to the aggregates. Every catalog row appears in
//!   the output, with zero counts if it had no events.

use std::collections::BTreeMap;

use incident_grid_models::{AggregatedUnit, CategoryCounts, Municipality, SpatialKey};

use crate::accumulator::RawAggregate;

/// Minimum-population thresholds for the two reliability concerns.
///
/// These are deliberately separate knobs: one gates the rate's
/// low-reliability flag on the aggregated unit itself, the other gates
/// display dimming on exported features. They are configured
/// independently and must not be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliabilityThresholds {
    /// Below this population, a unit's rate is flagged low-reliability.
    pub rate_min_population: u64,
    /// Below this population, exported features carry a display-dimming
    /// property for the map client.
    pub display_min_population: u64,
}

impl ReliabilityThresholds {
    /// Whether a unit's rate counts as low-reliability.
    #[must_use]
    pub const fn low_reliability(self, population: u64) -> bool {
        population < self.rate_min_population
    }

    /// Whether an exported feature should be dimmed by the client.
    #[must_use]
    pub const fn dim_display(self, population: u64) -> bool {
        population < self.display_min_population
    }
}

/// Incident rate normalized to a per-10,000-residents basis.
///
/// A unit with no population match gets rate 0.0; its raw counts stay
/// visible and the low-reliability flag marks the rate as meaningless.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rate_per_10000(total_count: u64, population: u64) -> f64 {
    if population == 0 {
        return 0.0;
    }
    (total_count as f64 / population.max(1) as f64) * 10_000.0
}

/// Event-driven join: attaches population to aggregated hex cells.
///
/// Left-outer from `aggregates`; `population` maps canonical cell id
/// strings to resident counts. Cells absent from the population table get
/// population 0 and a low-reliability rate, never dropped.
#[must_use]
pub fn join_cells(
    aggregates: Vec<RawAggregate>,
    population: &BTreeMap<String, u64>,
    thresholds: ReliabilityThresholds,
) -> Vec<AggregatedUnit> {
    aggregates
        .into_iter()
        .map(|aggregate| {
            let pop = population
                .get(aggregate.key.as_str())
                .copied()
                .unwrap_or(0);
            AggregatedUnit {
                rate_per_10000: rate_per_10000(aggregate.total_count, pop),
                low_reliability: thresholds.low_reliability(pop),
                key: aggregate.key,
                total_count: aggregate.total_count,
                categories: aggregate.categories,
                subtypes: aggregate.subtypes,
                population: pop,
            }
        })
        .collect()
}

/// Catalog-driven join: attaches aggregates to the fixed municipality
/// catalog.
///
/// Left-outer from `catalog`; aggregates must be keyed by municipality
/// code. Output cardinality always equals the catalog's, regardless of
/// incident volume.
#[must_use]
pub fn join_catalog(
    catalog: &[Municipality],
    aggregates: Vec<RawAggregate>,
    thresholds: ReliabilityThresholds,
) -> Vec<AggregatedUnit> {
    let mut by_code: BTreeMap<String, RawAggregate> = aggregates
        .into_iter()
        .map(|aggregate| (aggregate.key.as_str().to_string(), aggregate))
        .collect();

    catalog
        .iter()
        .map(|municipality| {
            let (total_count, categories, subtypes) = by_code
                .remove(&municipality.code)
                .map_or((0, CategoryCounts::default(), Vec::new()), |a| {
                    (a.total_count, a.categories, a.subtypes)
                });
            AggregatedUnit {
                key: SpatialKey::Municipality(municipality.code.clone()),
                total_count,
                categories,
                subtypes,
                population: municipality.population,
                rate_per_10000: rate_per_10000(total_count, municipality.population),
                low_reliability: thresholds.low_reliability(municipality.population),
            }
        })
        .collect()
}
