//! Build manifest: per-stage fingerprints and diagnostic counters.
//!
//! Stored at `<output_dir>/manifest.json` and written atomically after
//! every completed stage, so an interrupted run never loses the record of
//! stages that already published.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Current manifest schema version. Bump this when the manifest format
/// changes in a backward-incompatible way.
pub const MANIFEST_VERSION: u32 = 1;

/// Diagnostic counters persisted per aggregation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    pub mapped: u64,
    pub unmapped: u64,
    pub excluded: u64,
}

/// Record of one successfully completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Digest of the stage's declared inputs at completion time.
    pub fingerprint: String,
    /// ISO 8601 timestamp of the last successful run.
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<StageDiagnostics>,
}

/// The build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub stages: BTreeMap<String, StageRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            stages: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Loads the manifest from `dir/manifest.json`.
    ///
    /// Returns an empty manifest when the file is absent, unparsable, or
    /// has a different schema version; any of those simply means every
    /// stage is considered stale.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("manifest.json");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            log::info!("No existing manifest found");
            return Self::default();
        };
        match serde_json::from_str::<Self>(&contents) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => {
                log::info!("Loaded manifest from {}", path.display());
                manifest
            }
            Ok(manifest) => {
                log::warn!(
                    "Manifest version {} != {MANIFEST_VERSION}, rebuilding everything",
                    manifest.version
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to parse manifest {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Writes the manifest to `dir/manifest.json` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub fn save(&self, dir: &Path) -> Result<(), PipelineError> {
        let path = dir.join("manifest.json");
        let tmp_path = dir.join("manifest.json.tmp");
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Whether `stage` is stale for the given input fingerprint.
    ///
    /// Stale iff forced, never recorded, recorded with a different
    /// fingerprint, or the published output file is missing.
    #[must_use]
    pub fn is_stale(&self, stage: &str, fingerprint: &str, output: &Path, force: bool) -> bool {
        if force {
            return true;
        }
        match self.stages.get(stage) {
            Some(record) => record.fingerprint != fingerprint || !output.exists(),
            None => true,
        }
    }

    /// Records a completed stage.
    pub fn record(
        &mut self,
        stage: &str,
        fingerprint: String,
        diagnostics: Option<StageDiagnostics>,
    ) {
        self.stages.insert(
            stage.to_string(),
            StageRecord {
                fingerprint,
                completed_at: chrono::Utc::now().to_rfc3339(),
                diagnostics,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("incident_grid_manifest_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn save_load_round_trip() {
        let dir = temp_dir("round_trip");
        let mut manifest = Manifest::default();
        manifest.record(
            "aggregate_r5",
            "abc123".to_string(),
            Some(StageDiagnostics {
                mapped: 10,
                unmapped: 1,
                excluded: 2,
            }),
        );
        manifest.save(&dir).unwrap();

        let loaded = Manifest::load(&dir);
        assert_eq!(loaded, manifest);
        assert!(!dir.join("manifest.json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_manifest_means_everything_stale() {
        let dir = temp_dir("missing");
        let manifest = Manifest::load(&dir);
        assert!(manifest.is_stale("any", "fp", &dir.join("out.csv"), false));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn staleness_follows_fingerprint_and_output_presence() {
        let dir = temp_dir("staleness");
        let output = dir.join("out.csv");
        std::fs::write(&output, "data").unwrap();

        let mut manifest = Manifest::default();
        manifest.record("stage", "fp1".to_string(), None);

        assert!(!manifest.is_stale("stage", "fp1", &output, false));
        assert!(manifest.is_stale("stage", "fp2", &output, false));
        assert!(manifest.is_stale("stage", "fp1", &output, true));
        assert!(manifest.is_stale("stage", "fp1", &dir.join("gone.csv"), false));
        std::fs::remove_dir_all(&dir).ok();
    }
}
