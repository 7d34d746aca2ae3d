//! Pipeline error taxonomy.

use std::path::PathBuf;

use incident_grid_spatial::SpatialError;

/// Errors raised by pipeline stages and orchestration.
///
/// Unmappable records and missing population coverage are deliberately
/// absent here: both are defined fallbacks (diagnostic counter, population
/// 0) rather than errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A declared input file is absent. Fatal for the stage; raised
    /// before the stage touches its output.
    #[error("missing input: {path}")]
    InputMissing { path: PathBuf },

    /// An input lacks an expected field or column.
    #[error("input {path} is missing expected field `{field}`")]
    SchemaMismatch { path: PathBuf, field: String },

    /// An input file exists but cannot be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Configuration is present but invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An exclusion pattern failed to compile.
    #[error("invalid exclusion pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
