//! Order-independent two-level grouping of classified incidents.

use std::collections::BTreeMap;

use incident_grid_models::{CategoryCounts, SpatialKey, SubtypeCount};

/// Aggregated counts for one spatial key, before the population join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAggregate {
    pub key: SpatialKey,
    pub total_count: u64,
    pub categories: CategoryCounts,
    /// Sorted by count descending, subtype label ascending on ties.
    pub subtypes: Vec<SubtypeCount>,
}

/// Diagnostic counters for one aggregation run.
///
/// Event-count mass is conserved end-to-end:
/// `mapped + unmapped == non-excluded input records`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Records that resolved to a spatial key and were counted.
    pub mapped: u64,
    /// Records whose coordinates or location failed to resolve to any
    /// spatial key. Excluded from per-unit totals but never silently
    /// dropped.
    pub unmapped: u64,
    /// Editorial/meta pseudo-records removed by the exclusion filter
    /// before aggregation.
    pub excluded: u64,
}

/// Groups (spatial key, raw type) pairs into per-key subtype counts.
///
/// All operations are associative and commutative, so chunked or parallel
/// accumulation followed by [`Accumulator::merge`] produces results
/// identical to serial accumulation in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    groups: BTreeMap<SpatialKey, BTreeMap<String, u64>>,
    unmapped: u64,
    excluded: u64,
}

impl Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one record under its spatial key and normalized subtype.
    pub fn record(&mut self, key: SpatialKey, raw_type: &str) {
        let subtype = incident_grid_classify::normalize(raw_type);
        *self
            .groups
            .entry(key)
            .or_default()
            .entry(subtype)
            .or_insert(0) += 1;
    }

    /// Counts one record whose coordinates or location resolved to no
    /// spatial key.
    pub const fn record_unmapped(&mut self) {
        self.unmapped += 1;
    }

    /// Counts one record removed by the exclusion filter.
    pub const fn record_excluded(&mut self) {
        self.excluded += 1;
    }

    /// Merges another accumulator into this one.
    pub fn merge(&mut self, other: Self) {
        for (key, subtypes) in other.groups {
            let target = self.groups.entry(key).or_default();
            for (subtype, count) in subtypes {
                *target.entry(subtype).or_insert(0) += count;
            }
        }
        self.unmapped += other.unmapped;
        self.excluded += other.excluded;
    }

    /// Current diagnostic counters.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            mapped: self
                .groups
                .values()
                .flat_map(BTreeMap::values)
                .copied()
                .sum(),
            unmapped: self.unmapped,
            excluded: self.excluded,
        }
    }

    /// Rolls the subtype groups up into per-key aggregates.
    ///
    /// Classification happens here, once per distinct (key, subtype)
    /// group, through the shared table in `incident_grid_classify`.
    /// Totals and category counts are derived exclusively from the
    /// subtype groups so the reconciliation invariant cannot be violated.
    #[must_use]
    pub fn finish(self) -> (Vec<RawAggregate>, Diagnostics) {
        let diagnostics = self.diagnostics();

        let aggregates = self
            .groups
            .into_iter()
            .map(|(key, subtype_counts)| {
                let mut categories = CategoryCounts::default();
                let mut total_count = 0;
                let mut subtypes = Vec::with_capacity(subtype_counts.len());

                for (subtype, count) in subtype_counts {
                    categories.add(incident_grid_classify::classify(&subtype), count);
                    total_count += count;
                    subtypes.push(SubtypeCount { subtype, count });
                }
                subtypes.sort_by(SubtypeCount::ordering);

                RawAggregate {
                    key,
                    total_count,
                    categories,
                    subtypes,
                }
            })
            .collect();

        (aggregates, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_grid_models::Category;

    fn cell(key: &str) -> SpatialKey {
        SpatialKey::Cell(key.to_string())
    }

    #[test]
    fn two_subtype_cell_rolls_up_per_category() {
        // 3x assault (violence) + 2x theft (property) in one cell.
        let mut acc = Accumulator::new();
        for _ in 0..3 {
            acc.record(cell("8528308ffffffff"), "assault");
        }
        for _ in 0..2 {
            acc.record(cell("8528308ffffffff"), "theft");
        }

        let (aggregates, diagnostics) = acc.finish();
        assert_eq!(aggregates.len(), 1);
        let unit = &aggregates[0];
        assert_eq!(unit.categories.get(Category::Violence), 3);
        assert_eq!(unit.categories.get(Category::Property), 2);
        assert_eq!(unit.total_count, 5);
        assert_eq!(
            unit.subtypes,
            vec![
                SubtypeCount {
                    subtype: "assault".into(),
                    count: 3,
                },
                SubtypeCount {
                    subtype: "theft".into(),
                    count: 2,
                },
            ]
        );
        assert_eq!(diagnostics.mapped, 5);
        assert_eq!(diagnostics.unmapped, 0);
    }

    #[test]
    fn totals_reconcile_across_all_three_representations() {
        let mut acc = Accumulator::new();
        let raw_types = [
            "theft",
            "assault",
            "fraud",
            "drunk driving",
            "narcotics offence",
            "UNKNOWN SUBTYPE",
            "theft",
        ];
        for (i, raw) in raw_types.iter().enumerate() {
            acc.record(cell(if i % 2 == 0 { "a" } else { "b" }), raw);
        }

        let (aggregates, diagnostics) = acc.finish();
        let mut grand_total = 0;
        for unit in &aggregates {
            let subtype_sum: u64 = unit.subtypes.iter().map(|s| s.count).sum();
            assert_eq!(unit.total_count, unit.categories.total());
            assert_eq!(unit.total_count, subtype_sum);
            grand_total += unit.total_count;
        }
        assert_eq!(grand_total, diagnostics.mapped);
        assert_eq!(grand_total, raw_types.len() as u64);
    }

    #[test]
    fn merge_of_shuffled_chunks_matches_serial() {
        let records: Vec<(&str, &str)> = vec![
            ("a", "theft"),
            ("b", "assault"),
            ("a", "assault"),
            ("a", "theft"),
            ("c", "fraud"),
            ("b", "theft"),
            ("c", "robbery"),
        ];

        let mut serial = Accumulator::new();
        for (key, raw) in &records {
            serial.record(cell(key), raw);
        }
        serial.record_unmapped();

        // Same records split into chunks, one chunk reversed.
        let mut left = Accumulator::new();
        for (key, raw) in records.iter().take(3).rev() {
            left.record(cell(key), raw);
        }
        let mut right = Accumulator::new();
        for (key, raw) in records.iter().skip(3) {
            right.record(cell(key), raw);
        }
        right.record_unmapped();

        let mut merged = right;
        merged.merge(left);

        assert_eq!(serial, merged);
        assert_eq!(serial.finish(), merged.clone().finish());
    }

    #[test]
    fn unmapped_and_excluded_preserve_mass_conservation() {
        let mut acc = Accumulator::new();
        acc.record(cell("a"), "theft");
        acc.record(cell("a"), "assault");
        acc.record_unmapped();
        acc.record_excluded();

        let diagnostics = acc.diagnostics();
        assert_eq!(diagnostics.mapped, 2);
        assert_eq!(diagnostics.unmapped, 1);
        assert_eq!(diagnostics.excluded, 1);
        // 3 non-excluded records entered; 2 mapped + 1 unmapped leave.
        assert_eq!(diagnostics.mapped + diagnostics.unmapped, 3);
    }

    #[test]
    fn subtype_labels_are_normalized_before_grouping() {
        let mut acc = Accumulator::new();
        acc.record(cell("a"), "THEFT");
        acc.record(cell("a"), " theft ");

        let (aggregates, _) = acc.finish();
        assert_eq!(aggregates[0].subtypes.len(), 1);
        assert_eq!(aggregates[0].subtypes[0].count, 2);
        assert_eq!(aggregates[0].subtypes[0].subtype, "theft");
    }
}
