//! Feature export stage (tiling interface).
//!
//! Streams one geometry+properties feature per aggregated hex cell to a
//! [`FeatureSink`], with the cell boundary polygon reconstructed from the
//! cell id. The sink contract is bounded-memory: one feature is built and
//! written at a time, so fine resolutions with large cell cardinalities
//! stream in constant space. The external tiling tool (tippecanoe-class)
//! consumes the resulting `GeoJSONSeq` file; the tiling algorithm itself
//! is not part of this pipeline.

use std::io::Write;

use geojson::{Feature, Geometry, JsonObject, Value};
use incident_grid_aggregate::ReliabilityThresholds;
use incident_grid_models::AggregatedUnit;

use crate::error::PipelineError;

/// Streaming consumer of exported features.
pub trait FeatureSink {
    /// Writes one feature.
    ///
    /// # Errors
    ///
    /// Returns an error if the feature cannot be written.
    fn write_feature(&mut self, feature: &Feature) -> Result<(), PipelineError>;
}

/// Sink producing newline-delimited `GeoJSON` features.
pub struct GeoJsonSeqSink<W: Write> {
    writer: W,
    count: u64,
}

impl<W: Write> GeoJsonSeqSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Number of features written so far.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> FeatureSink for GeoJsonSeqSink<W> {
    fn write_feature(&mut self, feature: &Feature) -> Result<(), PipelineError> {
        serde_json::to_writer(&mut self.writer, feature)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }
}

/// Builds the exported feature for one aggregated hex cell.
///
/// Geometry is the closed boundary ring in `GeoJSON` (lon, lat) vertex
/// order; properties carry the full aggregated row plus the
/// display-dimming flag derived from the display threshold.
///
/// # Errors
///
/// Returns an error if the unit's key is not a valid cell id or the
/// subtype list cannot be serialized.
pub fn cell_feature(
    unit: &AggregatedUnit,
    thresholds: ReliabilityThresholds,
) -> Result<Feature, PipelineError> {
    let cell = incident_grid_spatial::parse_cell(unit.key.as_str())?;
    let boundary = incident_grid_spatial::boundary_for_cell(cell);

    let mut ring: Vec<Vec<f64>> = boundary
        .iter()
        .map(|&(lat, lon)| vec![lon, lat])
        .collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }

    let mut properties = JsonObject::new();
    properties.insert("cell".to_string(), unit.key.as_str().into());
    properties.insert("total_count".to_string(), unit.total_count.into());
    for &category in incident_grid_models::Category::all() {
        properties.insert(
            category.as_ref().to_string(),
            unit.categories.get(category).into(),
        );
    }
    properties.insert(
        "subtypes".to_string(),
        serde_json::to_value(&unit.subtypes)?,
    );
    properties.insert("population".to_string(), unit.population.into());
    properties.insert("rate_per_10000".to_string(), unit.rate_per_10000.into());
    properties.insert("low_reliability".to_string(), unit.low_reliability.into());
    properties.insert(
        "dim_display".to_string(),
        thresholds.dim_display(unit.population).into(),
    );

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Streams every aggregated cell to the sink, one feature at a time.
///
/// Returns the number of features written.
///
/// # Errors
///
/// Returns the first feature-building or sink error encountered.
pub fn export_cells<'a, I, S>(
    units: I,
    thresholds: ReliabilityThresholds,
    sink: &mut S,
) -> Result<u64, PipelineError>
where
    I: IntoIterator<Item = &'a AggregatedUnit>,
    S: FeatureSink + ?Sized,
{
    let mut written = 0;
    for unit in units {
        sink.write_feature(&cell_feature(unit, thresholds)?)?;
        written += 1;
    }
    Ok(written)
}
