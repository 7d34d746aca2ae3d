//! Pipeline configuration.
//!
//! All externally supplied knobs live in one TOML file: input paths, the
//! output directory, the set of hex resolutions to build, the two
//! reliability thresholds, and the excluded-type patterns.

use std::path::{Path, PathBuf};

use incident_grid_aggregate::ReliabilityThresholds;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Paths to the three read-only source inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsConfig {
    /// Incident source: columnar CSV of point-located incident records.
    pub incidents: PathBuf,
    /// Population grid source: GeoJSON in ETRS-TM35FIN projected meters.
    pub population_grid: PathBuf,
    /// Fixed municipality catalog CSV (code, name, population).
    pub municipalities: PathBuf,
}

/// The two minimum-population reliability thresholds.
///
/// Kept as two distinct values on purpose: rate reliability and display
/// dimming are separate consumer concerns that happen to share a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    pub rate_min_population: u64,
    pub display_min_population: u64,
}

impl From<ReliabilityConfig> for ReliabilityThresholds {
    fn from(config: ReliabilityConfig) -> Self {
        Self {
            rate_min_population: config.rate_min_population,
            display_min_population: config.display_min_population,
        }
    }
}

/// Top-level pipeline configuration, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub inputs: InputsConfig,
    /// Directory receiving all published outputs and the manifest.
    pub output_dir: PathBuf,
    /// Hex grid resolutions to build, e.g. `[4, 5, 6]`.
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<u8>,
    pub reliability: ReliabilityConfig,
    /// Case-insensitive regex patterns matching editorial/meta
    /// pseudo-record types that must not be aggregated.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_resolutions() -> Vec<u8> {
    vec![4, 5, 6]
}

impl PipelineConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InputMissing`] if the file is absent,
    /// [`PipelineError::Parse`] if it is not valid TOML, and
    /// [`PipelineError::Config`] for semantically invalid values.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::InputMissing {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| PipelineError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.resolutions.is_empty() {
            return Err(PipelineError::Config(
                "resolutions must not be empty".to_string(),
            ));
        }
        for &res in &self.resolutions {
            if res > 15 {
                return Err(PipelineError::Config(format!(
                    "resolution {res} outside hex grid range 0-15"
                )));
            }
        }
        // Compile patterns now so a bad regex fails the run up front.
        self.exclusion_filter()?;
        Ok(())
    }

    /// Compiles the excluded-type patterns into a matcher.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Pattern`] naming the offending pattern.
    pub fn exclusion_filter(&self) -> Result<ExclusionFilter, PipelineError> {
        let patterns = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PipelineError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExclusionFilter { patterns })
    }

    pub(crate) fn thresholds(&self) -> ReliabilityThresholds {
        self.reliability.into()
    }
}

/// Matcher for editorial/meta pseudo-record types.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    patterns: Vec<regex::Regex>,
}

impl ExclusionFilter {
    /// Whether a raw incident type matches any configured exclusion
    /// pattern.
    #[must_use]
    pub fn is_excluded(&self, raw_type: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(raw_type))
    }
}
