//! Population conversion stage.
//!
//! Reprojects each population source cell's centroid from ETRS-TM35FIN
//! into geodetic coordinates and re-indexes it into the hex grid at one
//! resolution, summing counts for source cells that land in the same hex
//! cell.

use std::collections::BTreeMap;

use h3o::Resolution;
use incident_grid_models::PopulationCell;
use incident_grid_spatial::reproject::tm35_to_wgs84;

use crate::inputs::PopulationSourceCell;

/// Converts population source cells into per-hex-cell totals at the
/// given resolution.
///
/// Source cells whose reprojected centroid cannot be indexed are logged
/// and skipped; with a well-formed grid this never happens.
#[must_use]
pub fn convert_population(
    source_cells: &[PopulationSourceCell],
    resolution: Resolution,
) -> Vec<PopulationCell> {
    let mut by_cell: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
    let mut skipped: u64 = 0;

    for source in source_cells {
        let (lat, lon) = tm35_to_wgs84(source.easting, source.northing);
        match incident_grid_spatial::cell_for_point(lat, lon, resolution) {
            Ok(cell) => {
                let entry = by_cell.entry(cell.to_string()).or_insert((0, 0, 0));
                entry.0 += source.population;
                entry.1 += source.female;
                entry.2 += source.male;
            }
            Err(e) => {
                log::warn!(
                    "Skipping population cell at ({}, {}): {e}",
                    source.easting,
                    source.northing
                );
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} unindexable population cells");
    }

    by_cell
        .into_iter()
        .map(|(cell, (population, female, male))| PopulationCell {
            cell,
            population,
            female,
            male,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_grid_spatial::reproject::wgs84_to_tm35;

    fn source(easting: f64, northing: f64, population: u64) -> PopulationSourceCell {
        PopulationSourceCell {
            easting,
            northing,
            population,
            female: population / 2,
            male: population - population / 2,
        }
    }

    #[test]
    fn nearby_source_cells_sum_into_one_hex_cell() {
        // Two 1 km grid squares well inside one resolution-4 hex
        // (~22 km edge).
        let (e, n) = wgs84_to_tm35(60.17, 24.94);
        let cells = vec![source(e, n, 100), source(e + 1000.0, n, 50)];

        let rows = convert_population(&cells, Resolution::Four);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].population, 150);
        assert_eq!(rows[0].female + rows[0].male, 150);
    }

    #[test]
    fn distant_source_cells_stay_separate_at_fine_resolution() {
        let (e1, n1) = wgs84_to_tm35(60.17, 24.94);
        let (e2, n2) = wgs84_to_tm35(61.50, 23.76);
        let cells = vec![source(e1, n1, 100), source(e2, n2, 50)];

        let rows = convert_population(&cells, Resolution::Six);
        assert_eq!(rows.len(), 2);
        let total: u64 = rows.iter().map(|r| r.population).sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn conversion_is_deterministic() {
        let (e, n) = wgs84_to_tm35(62.0, 26.0);
        let cells = vec![source(e, n, 10), source(e + 500.0, n - 500.0, 20)];
        assert_eq!(
            convert_population(&cells, Resolution::Five),
            convert_population(&cells, Resolution::Five)
        );
    }
}
