//! Columnar table schemas and atomic CSV readers/writers.
//!
//! One row per spatial unit; the sparse subtype list is embedded as a
//! JSON array so the table stays a flat columnar file readable by the
//! serving layer.

use std::collections::BTreeMap;
use std::path::Path;

use incident_grid_models::{
    AggregatedUnit, CategoryCounts, Municipality, PopulationCell, SpatialKey, SubtypeCount,
};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::publish::write_atomic;

/// One row of a per-resolution aggregated hex cell table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRow {
    pub cell: String,
    pub total_count: u64,
    pub traffic: u64,
    pub property: u64,
    pub violence: u64,
    pub narcotics: u64,
    pub fraud: u64,
    pub public_order: u64,
    pub weapons: u64,
    pub other: u64,
    /// JSON array of `{"subtype": ..., "count": ...}` objects, sorted by
    /// count descending.
    pub subtypes: String,
    pub population: u64,
    pub rate_per_10000: f64,
    pub low_reliability: bool,
}

impl CellRow {
    /// # Errors
    ///
    /// Returns an error if the subtype list cannot be serialized.
    pub fn from_unit(unit: &AggregatedUnit) -> Result<Self, PipelineError> {
        Ok(Self {
            cell: unit.key.as_str().to_string(),
            total_count: unit.total_count,
            traffic: unit.categories.traffic,
            property: unit.categories.property,
            violence: unit.categories.violence,
            narcotics: unit.categories.narcotics,
            fraud: unit.categories.fraud,
            public_order: unit.categories.public_order,
            weapons: unit.categories.weapons,
            other: unit.categories.other,
            subtypes: serde_json::to_string(&unit.subtypes)?,
            population: unit.population,
            rate_per_10000: unit.rate_per_10000,
            low_reliability: unit.low_reliability,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the embedded subtype JSON cannot be parsed.
    pub fn into_unit(self) -> Result<AggregatedUnit, PipelineError> {
        let subtypes: Vec<SubtypeCount> = serde_json::from_str(&self.subtypes)?;
        Ok(AggregatedUnit {
            key: SpatialKey::Cell(self.cell),
            total_count: self.total_count,
            categories: CategoryCounts {
                traffic: self.traffic,
                property: self.property,
                violence: self.violence,
                narcotics: self.narcotics,
                fraud: self.fraud,
                public_order: self.public_order,
                weapons: self.weapons,
                other: self.other,
            },
            subtypes,
            population: self.population,
            rate_per_10000: self.rate_per_10000,
            low_reliability: self.low_reliability,
        })
    }
}

/// One row of the aggregated municipality table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityRow {
    pub code: String,
    pub name: String,
    pub total_count: u64,
    pub traffic: u64,
    pub property: u64,
    pub violence: u64,
    pub narcotics: u64,
    pub fraud: u64,
    pub public_order: u64,
    pub weapons: u64,
    pub other: u64,
    pub subtypes: String,
    pub population: u64,
    pub rate_per_10000: f64,
    pub low_reliability: bool,
}

impl MunicipalityRow {
    /// # Errors
    ///
    /// Returns an error if the subtype list cannot be serialized.
    pub fn from_unit(unit: &AggregatedUnit, name: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            code: unit.key.as_str().to_string(),
            name: name.to_string(),
            total_count: unit.total_count,
            traffic: unit.categories.traffic,
            property: unit.categories.property,
            violence: unit.categories.violence,
            narcotics: unit.categories.narcotics,
            fraud: unit.categories.fraud,
            public_order: unit.categories.public_order,
            weapons: unit.categories.weapons,
            other: unit.categories.other,
            subtypes: serde_json::to_string(&unit.subtypes)?,
            population: unit.population,
            rate_per_10000: unit.rate_per_10000,
            low_reliability: unit.low_reliability,
        })
    }
}

fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    write_atomic(path, |writer| {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    })
}

/// Publishes a per-resolution population-by-cell table.
///
/// # Errors
///
/// Returns an error if the write or atomic rename fails.
pub fn write_population_table(path: &Path, rows: &[PopulationCell]) -> Result<(), PipelineError> {
    write_csv_atomic(path, rows)?;
    log::info!("Published {} population rows to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a published population-by-cell table into a cell -> population
/// map for the join.
///
/// # Errors
///
/// Returns [`PipelineError::InputMissing`] if the table is absent (the
/// upstream stage has not published) or a CSV error for malformed rows.
pub fn read_population_table(path: &Path) -> Result<BTreeMap<String, u64>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::InputMissing {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut map = BTreeMap::new();
    for row in reader.deserialize::<PopulationCell>() {
        let cell = row?;
        map.insert(cell.cell, cell.population);
    }
    Ok(map)
}

/// Publishes a per-resolution aggregated hex cell table.
///
/// # Errors
///
/// Returns an error if serialization, the write, or the atomic rename
/// fails.
pub fn write_cell_table(path: &Path, units: &[AggregatedUnit]) -> Result<(), PipelineError> {
    let rows = units
        .iter()
        .map(CellRow::from_unit)
        .collect::<Result<Vec<_>, _>>()?;
    write_csv_atomic(path, &rows)?;
    log::info!("Published {} aggregated cells to {}", rows.len(), path.display());
    Ok(())
}

/// Reads a published aggregated hex cell table back into units.
///
/// # Errors
///
/// Returns [`PipelineError::InputMissing`] if the table is absent, or a
/// CSV/JSON error for malformed rows.
pub fn read_cell_table(path: &Path) -> Result<Vec<AggregatedUnit>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::InputMissing {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut units = Vec::new();
    for row in reader.deserialize::<CellRow>() {
        units.push(row?.into_unit()?);
    }
    Ok(units)
}

/// Publishes the aggregated municipality table.
///
/// `names` maps municipality codes to display names from the catalog.
///
/// # Errors
///
/// Returns an error if serialization, the write, or the atomic rename
/// fails.
pub fn write_municipality_table(
    path: &Path,
    units: &[AggregatedUnit],
    catalog: &[Municipality],
) -> Result<(), PipelineError> {
    let names: BTreeMap<&str, &str> = catalog
        .iter()
        .map(|m| (m.code.as_str(), m.name.as_str()))
        .collect();
    let rows = units
        .iter()
        .map(|unit| {
            let name = names.get(unit.key.as_str()).copied().unwrap_or_default();
            MunicipalityRow::from_unit(unit, name)
        })
        .collect::<Result<Vec<_>, _>>()?;
    write_csv_atomic(path, &rows)?;
    log::info!(
        "Published {} aggregated municipalities to {}",
        rows.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_grid_models::Category;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("incident_grid_tables_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_unit() -> AggregatedUnit {
        let mut categories = CategoryCounts::default();
        categories.add(Category::Property, 2);
        categories.add(Category::Violence, 1);
        AggregatedUnit {
            key: SpatialKey::Cell("8528308ffffffff".into()),
            total_count: 3,
            categories,
            subtypes: vec![
                SubtypeCount {
                    subtype: "theft".into(),
                    count: 2,
                },
                SubtypeCount {
                    subtype: "assault".into(),
                    count: 1,
                },
            ],
            population: 1200,
            rate_per_10000: 25.0,
            low_reliability: true,
        }
    }

    #[test]
    fn cell_table_round_trip_preserves_units() {
        let dir = temp_dir("cell_round_trip");
        let path = dir.join("aggregated_r5.csv");
        let units = vec![sample_unit()];

        write_cell_table(&path, &units).unwrap();
        let read_back = read_cell_table(&path).unwrap();

        assert_eq!(read_back, units);
        assert!(read_back[0].reconciles());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn population_table_round_trip() {
        let dir = temp_dir("population");
        let path = dir.join("population_r5.csv");
        let rows = vec![
            PopulationCell {
                cell: "aaa".into(),
                population: 100,
                female: 60,
                male: 40,
            },
            PopulationCell {
                cell: "bbb".into(),
                population: 55,
                female: 25,
                male: 30,
            },
        ];

        write_population_table(&path, &rows).unwrap();
        let map = read_population_table(&path).unwrap();
        assert_eq!(map.get("aaa"), Some(&100));
        assert_eq!(map.get("bbb"), Some(&55));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reading_unpublished_table_is_input_missing() {
        let dir = temp_dir("missing");
        let err = read_cell_table(&dir.join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
