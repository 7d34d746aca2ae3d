#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared data model for the incident-grid aggregation pipeline.
//!
//! This crate defines the canonical 8-bucket incident category taxonomy,
//! the count structures produced by aggregation, and the record types read
//! from the external incident, population, and municipality sources. All
//! aggregation paths (hex-cell and municipality) share these types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Top-level incident category buckets.
///
/// Every incident subtype maps to exactly one of these 8 categories.
/// Unrecognized subtypes fall back to [`Category::Other`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Traffic offenses and accidents (DUI, hit-and-run, endangerment)
    Traffic,
    /// Crimes against property (theft, burglary, vandalism, arson)
    Property,
    /// Crimes against persons (assault, homicide, robbery, sexual offenses)
    Violence,
    /// Drug and narcotics offenses
    Narcotics,
    /// Fraud, forgery, embezzlement, identity misuse
    Fraud,
    /// Public order and quality-of-life offenses
    PublicOrder,
    /// Firearms and other weapons offenses
    Weapons,
    /// Offenses not fitting other categories, and unresolved subtypes
    Other,
}

impl Category {
    /// Returns all variants of this enum, in column order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Traffic,
            Self::Property,
            Self::Violence,
            Self::Narcotics,
            Self::Fraud,
            Self::PublicOrder,
            Self::Weapons,
            Self::Other,
        ]
    }
}

/// Fixed set of 8 per-category counters for one spatial unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub traffic: u64,
    pub property: u64,
    pub violence: u64,
    pub narcotics: u64,
    pub fraud: u64,
    pub public_order: u64,
    pub weapons: u64,
    pub other: u64,
}

impl CategoryCounts {
    /// Adds `count` to the counter for `category`.
    pub const fn add(&mut self, category: Category, count: u64) {
        match category {
            Category::Traffic => self.traffic += count,
            Category::Property => self.property += count,
            Category::Violence => self.violence += count,
            Category::Narcotics => self.narcotics += count,
            Category::Fraud => self.fraud += count,
            Category::PublicOrder => self.public_order += count,
            Category::Weapons => self.weapons += count,
            Category::Other => self.other += count,
        }
    }

    /// Returns the counter for `category`.
    #[must_use]
    pub const fn get(self, category: Category) -> u64 {
        match category {
            Category::Traffic => self.traffic,
            Category::Property => self.property,
            Category::Violence => self.violence,
            Category::Narcotics => self.narcotics,
            Category::Fraud => self.fraud,
            Category::PublicOrder => self.public_order,
            Category::Weapons => self.weapons,
            Category::Other => self.other,
        }
    }

    /// Sum across all 8 categories.
    #[must_use]
    pub const fn total(self) -> u64 {
        self.traffic
            + self.property
            + self.violence
            + self.narcotics
            + self.fraud
            + self.public_order
            + self.weapons
            + self.other
    }
}

/// Count of one observed incident subtype within a spatial unit.
///
/// Sparse: only subtypes actually observed in the unit appear in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeCount {
    /// Raw subtype label as it appears in the source data (normalized case).
    pub subtype: String,
    pub count: u64,
}

impl SubtypeCount {
    /// Sort key: count descending, subtype label ascending on ties.
    ///
    /// Determinism of the per-unit subtype list depends on this ordering.
    #[must_use]
    pub fn ordering(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.count
            .cmp(&a.count)
            .then_with(|| a.subtype.cmp(&b.subtype))
    }
}

/// Spatial key of an aggregated unit: a hex cell or a municipality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialKey {
    /// Canonical hex string of an H3 cell index.
    Cell(String),
    /// Municipality code from the fixed catalog.
    Municipality(String),
}

impl SpatialKey {
    /// The raw key string, without the variant tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cell(s) | Self::Municipality(s) => s,
        }
    }
}

/// One fully aggregated spatial unit: counts, population, and rate.
///
/// Invariant: `total_count == categories.total() == sum(subtypes[].count)`,
/// for every unit, at every resolution. See [`AggregatedUnit::reconciles`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedUnit {
    pub key: SpatialKey,
    pub total_count: u64,
    pub categories: CategoryCounts,
    /// Observed subtypes, sorted by count descending then label ascending.
    pub subtypes: Vec<SubtypeCount>,
    pub population: u64,
    pub rate_per_10000: f64,
    /// Set when the unit's population is below the configured reliability
    /// threshold (or absent entirely). The unit and its raw counts remain
    /// visible regardless.
    pub low_reliability: bool,
}

impl AggregatedUnit {
    /// Checks the three-way count reconciliation invariant.
    #[must_use]
    pub fn reconciles(&self) -> bool {
        let subtype_sum: u64 = self.subtypes.iter().map(|s| s.count).sum();
        self.total_count == self.categories.total() && self.total_count == subtype_sum
    }
}

/// One row of the fixed municipality catalog.
///
/// The catalog has fixed cardinality: every municipality appears in the
/// aggregated output even with zero incidents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    pub population: u64,
}

/// One raw incident record from the external incident source.
///
/// Immutable and read-only; coordinates may be absent for ungeocoded
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub occurred_at: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Free-text incident type as reported by the source system.
    pub offence_type: String,
    /// Free-text location name (municipality for catalog aggregation).
    pub location_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Per-resolution population totals for one hex cell, after conversion
/// from the source grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCell {
    /// Canonical hex string of the H3 cell index.
    pub cell: String,
    pub population: u64,
    pub female: u64,
    pub male: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for &category in Category::all() {
            let s = category.to_string();
            let parsed: Category = s.parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!(Category::PublicOrder.to_string(), "public_order");
    }

    #[test]
    fn category_counts_add_and_total() {
        let mut counts = CategoryCounts::default();
        counts.add(Category::Violence, 3);
        counts.add(Category::Property, 2);
        counts.add(Category::Violence, 1);
        assert_eq!(counts.get(Category::Violence), 4);
        assert_eq!(counts.get(Category::Property), 2);
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn subtype_ordering_breaks_ties_by_label() {
        let mut list = vec![
            SubtypeCount {
                subtype: "theft".into(),
                count: 2,
            },
            SubtypeCount {
                subtype: "assault".into(),
                count: 5,
            },
            SubtypeCount {
                subtype: "arson".into(),
                count: 2,
            },
        ];
        list.sort_by(SubtypeCount::ordering);
        let labels: Vec<&str> = list.iter().map(|s| s.subtype.as_str()).collect();
        assert_eq!(labels, vec!["assault", "arson", "theft"]);
    }

    #[test]
    fn reconciliation_detects_drift() {
        let mut categories = CategoryCounts::default();
        categories.add(Category::Violence, 3);
        let unit = AggregatedUnit {
            key: SpatialKey::Cell("8528308ffffffff".into()),
            total_count: 3,
            categories,
            subtypes: vec![SubtypeCount {
                subtype: "assault".into(),
                count: 3,
            }],
            population: 100,
            rate_per_10000: 300.0,
            low_reliability: false,
        };
        assert!(unit.reconciles());

        let mut broken = unit;
        broken.subtypes[0].count = 2;
        assert!(!broken.reconciles());
    }
}
