//! Per-stage input fingerprinting.
//!
//! Every stage declares its inputs (file contents, the classification
//! table, configuration values) into a [`Fingerprint`]; the resulting
//! digest is compared against the manifest record to decide staleness.
//! Dependency tracking is declarative: output content is never inspected.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::PipelineError;

/// Incremental SHA-256 digest over a stage's declared inputs.
#[derive(Debug)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    #[must_use]
    pub fn new(stage: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"stage=");
        hasher.update(stage.as_bytes());
        Self { hasher }
    }

    /// Declares a labeled value (configuration knob, table version, ...).
    #[must_use]
    pub fn with_value(mut self, label: &str, value: &str) -> Self {
        self.hasher.update(b"\x00");
        self.hasher.update(label.as_bytes());
        self.hasher.update(b"=");
        self.hasher.update(value.as_bytes());
        self
    }

    /// Declares an input file by content hash.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InputMissing`] if the file is absent —
    /// a stage with a missing declared input must fail before touching
    /// its output.
    pub fn with_file(mut self, label: &str, path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::InputMissing {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read(path)?;
        let mut file_hasher = Sha256::new();
        file_hasher.update(&contents);
        let digest = hex::encode(file_hasher.finalize());
        Ok(self.with_value(label, &digest))
    }

    /// Finalizes into a hex digest string.
    #[must_use]
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
