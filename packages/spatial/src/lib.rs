#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Deterministic point<->cell mapping over the hierarchical H3 hex grid.
//!
//! Wraps the `h3o` cell math behind the small surface the aggregation
//! pipeline needs: point -> cell at a given resolution, and the inverse
//! cell -> boundary polygon used for rendering. Coordinate reprojection
//! from the population source's projected CRS lives in [`reproject`] as a
//! separate, composable step since the incident and population sources use
//! different reference systems.

pub mod reproject;

use h3o::{CellIndex, LatLng, Resolution};

/// Errors from spatial indexing.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Coordinates are non-finite or outside valid geodetic ranges.
    ///
    /// Callers count these records in the unmapped diagnostic rather than
    /// dropping them.
    #[error("coordinates out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },
    /// Resolution value outside the H3 range 0-15.
    #[error("invalid hex grid resolution: {0}")]
    InvalidResolution(u8),
    /// String is not a valid H3 cell index.
    #[error("invalid cell id: {0}")]
    InvalidCell(String),
}

/// Converts a numeric resolution level into an H3 [`Resolution`].
///
/// # Errors
///
/// Returns [`SpatialError::InvalidResolution`] for values outside 0-15.
pub fn resolution(value: u8) -> Result<Resolution, SpatialError> {
    Resolution::try_from(value).map_err(|_| SpatialError::InvalidResolution(value))
}

/// Maps a geodetic point to its hex cell at the given resolution.
///
/// Pure and deterministic: identical inputs always yield the identical
/// cell.
///
/// # Errors
///
/// Returns [`SpatialError::OutOfRange`] when the coordinates are
/// non-finite or outside [-90, 90] / [-180, 180].
pub fn cell_for_point(lat: f64, lon: f64, resolution: Resolution) -> Result<CellIndex, SpatialError> {
    if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(SpatialError::OutOfRange { lat, lon });
    }
    let coord = LatLng::new(lat, lon).map_err(|_| SpatialError::OutOfRange { lat, lon })?;
    Ok(coord.to_cell(resolution))
}

/// Returns the ordered boundary ring of a cell as (lat, lon) vertices.
///
/// The exact inverse of [`cell_for_point`] used for rendering. The ring is
/// not closed; consumers append the first vertex when a closed ring is
/// required.
#[must_use]
pub fn boundary_for_cell(cell: CellIndex) -> Vec<(f64, f64)> {
    cell.boundary()
        .iter()
        .map(|vertex| (vertex.lat(), vertex.lng()))
        .collect()
}

/// Parses a canonical hex cell id string back into a [`CellIndex`].
///
/// # Errors
///
/// Returns [`SpatialError::InvalidCell`] when the string is not a valid
/// H3 index.
pub fn parse_cell(s: &str) -> Result<CellIndex, SpatialError> {
    s.parse()
        .map_err(|_| SpatialError::InvalidCell(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_for_point_is_deterministic() {
        let res = resolution(6).unwrap();
        let a = cell_for_point(60.1699, 24.9384, res).unwrap();
        let b = cell_for_point(60.1699, 24.9384, res).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn finer_resolution_subdivides_parent() {
        let coarse = resolution(5).unwrap();
        let fine = resolution(6).unwrap();
        let parent = cell_for_point(60.1699, 24.9384, coarse).unwrap();
        let child = cell_for_point(60.1699, 24.9384, fine).unwrap();
        assert_eq!(child.parent(coarse), Some(parent));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let res = resolution(6).unwrap();
        assert!(matches!(
            cell_for_point(95.0, 24.9, res),
            Err(SpatialError::OutOfRange { .. })
        ));
        assert!(matches!(
            cell_for_point(60.0, 200.0, res),
            Err(SpatialError::OutOfRange { .. })
        ));
        assert!(matches!(
            cell_for_point(f64::NAN, 24.9, res),
            Err(SpatialError::OutOfRange { .. })
        ));
    }

    #[test]
    fn boundary_is_inverse_of_cell_lookup() {
        let res = resolution(6).unwrap();
        let cell = cell_for_point(60.1699, 24.9384, res).unwrap();
        let ring = boundary_for_cell(cell);
        assert!(ring.len() >= 5, "hex boundary should have 5-6 vertices");

        // The ring centroid must map back to the same cell.
        #[allow(clippy::cast_precision_loss)]
        let n = ring.len() as f64;
        let (lat_sum, lon_sum) = ring
            .iter()
            .fold((0.0, 0.0), |(la, lo), (lat, lon)| (la + lat, lo + lon));
        let round_trip = cell_for_point(lat_sum / n, lon_sum / n, res).unwrap();
        assert_eq!(round_trip, cell);
    }

    #[test]
    fn cell_id_string_round_trip() {
        let res = resolution(5).unwrap();
        let cell = cell_for_point(61.4978, 23.7610, res).unwrap();
        let s = cell.to_string();
        assert_eq!(parse_cell(&s).unwrap(), cell);
        assert!(parse_cell("not-a-cell").is_err());
    }

    #[test]
    fn invalid_resolution_is_rejected() {
        assert!(matches!(
            resolution(16),
            Err(SpatialError::InvalidResolution(16))
        ));
    }
}
