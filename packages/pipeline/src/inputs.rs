//! Readers for the three read-only source inputs.
//!
//! Each reader fails with [`PipelineError::InputMissing`] before touching
//! anything when its file is absent, and with
//! [`PipelineError::SchemaMismatch`] naming the first missing field when
//! the file exists but lacks an expected column or property.

use std::path::Path;

use geo::Centroid;
use geojson::GeoJson;
use incident_grid_models::{IncidentRecord, Municipality};

use crate::error::PipelineError;

/// One population source cell reduced to its projected centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSourceCell {
    /// Centroid easting in ETRS-TM35FIN meters.
    pub easting: f64,
    /// Centroid northing in ETRS-TM35FIN meters.
    pub northing: f64,
    pub population: u64,
    pub female: u64,
    pub male: u64,
}

fn require_file(path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::InputMissing {
            path: path.to_path_buf(),
        })
    }
}

fn require_headers(
    path: &Path,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), PipelineError> {
    for field in required {
        if !headers.iter().any(|h| h == *field) {
            return Err(PipelineError::SchemaMismatch {
                path: path.to_path_buf(),
                field: (*field).to_string(),
            });
        }
    }
    Ok(())
}

/// Reads the incident source CSV.
///
/// Required columns: `occurred_at`, `latitude`, `longitude`,
/// `offence_type`, `location_name`. Extra narrative columns are
/// tolerated; blank coordinates deserialize to `None`.
///
/// # Errors
///
/// Returns [`PipelineError::InputMissing`], [`PipelineError::SchemaMismatch`],
/// or a CSV error for malformed rows.
pub fn read_incidents(path: &Path) -> Result<Vec<IncidentRecord>, PipelineError> {
    require_file(path)?;
    let mut reader = csv::Reader::from_path(path)?;
    require_headers(
        path,
        reader.headers()?,
        &[
            "occurred_at",
            "latitude",
            "longitude",
            "offence_type",
            "location_name",
        ],
    )?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    log::info!("Read {} incident records from {}", records.len(), path.display());
    Ok(records)
}

/// Reads the fixed municipality catalog CSV (`code`, `name`,
/// `population`).
///
/// # Errors
///
/// Returns [`PipelineError::InputMissing`], [`PipelineError::SchemaMismatch`],
/// or a CSV error for malformed rows.
pub fn read_municipalities(path: &Path) -> Result<Vec<Municipality>, PipelineError> {
    require_file(path)?;
    let mut reader = csv::Reader::from_path(path)?;
    require_headers(path, reader.headers()?, &["code", "name", "population"])?;

    let mut catalog = Vec::new();
    for row in reader.deserialize() {
        catalog.push(row?);
    }
    log::info!(
        "Read {} municipalities from {}",
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}

/// Reads the population grid GeoJSON and reduces each source cell to its
/// projected centroid plus population counts.
///
/// Geometries may be polygons or points, in ETRS-TM35FIN meters. The
/// `population` property is required; `female`/`male` default to 0.
///
/// # Errors
///
/// Returns [`PipelineError::InputMissing`], [`PipelineError::Parse`] for
/// invalid GeoJSON, or [`PipelineError::SchemaMismatch`] for features
/// without geometry or population.
pub fn read_population_grid(path: &Path) -> Result<Vec<PopulationSourceCell>, PipelineError> {
    require_file(path)?;
    let contents = std::fs::read_to_string(path)?;
    let geojson: GeoJson = contents.parse().map_err(|e| PipelineError::Parse {
        path: path.to_path_buf(),
        message: format!("{e}"),
    })?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(PipelineError::Parse {
            path: path.to_path_buf(),
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let mut cells = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            return Err(PipelineError::SchemaMismatch {
                path: path.to_path_buf(),
                field: "geometry".to_string(),
            });
        };
        let geometry: geo::Geometry<f64> =
            geometry.try_into().map_err(|e| PipelineError::Parse {
                path: path.to_path_buf(),
                message: format!("unsupported geometry: {e}"),
            })?;
        let Some(centroid) = geometry.centroid() else {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                message: "geometry has no centroid".to_string(),
            });
        };

        let population = require_count_property(path, feature.properties.as_ref(), "population")?;
        let female = optional_count_property(feature.properties.as_ref(), "female");
        let male = optional_count_property(feature.properties.as_ref(), "male");

        cells.push(PopulationSourceCell {
            easting: centroid.x(),
            northing: centroid.y(),
            population,
            female,
            male,
        });
    }
    log::info!(
        "Read {} population grid cells from {}",
        cells.len(),
        path.display()
    );
    Ok(cells)
}

fn require_count_property(
    path: &Path,
    properties: Option<&geojson::JsonObject>,
    field: &str,
) -> Result<u64, PipelineError> {
    properties
        .and_then(|props| props.get(field))
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PipelineError::SchemaMismatch {
            path: path.to_path_buf(),
            field: field.to_string(),
        })
}

fn optional_count_property(properties: Option<&geojson::JsonObject>, field: &str) -> u64 {
    properties
        .and_then(|props| props.get(field))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("incident_grid_inputs_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn reads_incidents_with_blank_coordinates() {
        let dir = temp_dir("incidents");
        let path = dir.join("incidents.csv");
        std::fs::write(
            &path,
            "occurred_at,latitude,longitude,offence_type,location_name,description\n\
             2024-03-01T12:00:00,60.17,24.94,Theft,Helsinki,stolen bicycle\n\
             2024-03-02T08:30:00,,,Assault,Tampere,\n",
        )
        .unwrap();

        let records = read_incidents(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offence_type, "Theft");
        assert_eq!(records[0].latitude, Some(60.17));
        assert_eq!(records[1].latitude, None);
        assert_eq!(records[1].description, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_column_names_the_field() {
        let dir = temp_dir("schema");
        let path = dir.join("incidents.csv");
        std::fs::write(&path, "occurred_at,latitude,longitude,location_name\n").unwrap();

        let err = read_incidents(&path).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "offence_type"),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_input_missing() {
        let err = read_incidents(Path::new("/nonexistent/incidents.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::InputMissing { .. }));
    }

    #[test]
    fn reads_population_grid_points_and_polygons() {
        let dir = temp_dir("population");
        let path = dir.join("grid.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[386000.0,6672000.0]},
                 "properties":{"population":120,"female":70,"male":50}},
                {"type":"Feature","geometry":{"type":"Polygon","coordinates":
                  [[[386000.0,6673000.0],[387000.0,6673000.0],[387000.0,6674000.0],[386000.0,6674000.0],[386000.0,6673000.0]]]},
                 "properties":{"population":30}}
            ]}"#,
        )
        .unwrap();

        let cells = read_population_grid(&path).unwrap();
        assert_eq!(cells.len(), 2);
        assert!((cells[0].easting - 386_000.0).abs() < 1e-9);
        assert_eq!(cells[0].population, 120);
        assert_eq!(cells[0].female, 70);
        // Polygon centroid, defaulted female/male.
        assert!((cells[1].easting - 386_500.0).abs() < 1e-6);
        assert!((cells[1].northing - 6_673_500.0).abs() < 1e-6);
        assert_eq!(cells[1].female, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn population_property_is_required() {
        let dir = temp_dir("population_schema");
        let path = dir.join("grid.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[1.0,2.0]},
                 "properties":{"female":1}}
            ]}"#,
        )
        .unwrap();

        let err = read_population_grid(&path).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { field, .. } => assert_eq!(field, "population"),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
