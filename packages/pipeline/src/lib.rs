#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Multi-resolution build pipeline for aggregated incident tables.
//!
//! Orchestrates a dependency-ordered stage graph per hex resolution
//! (population conversion -> incident aggregation -> feature export)
//! plus one resolution-independent municipality aggregation stage.
//!
//! Staleness is driven by declarative input fingerprinting: every stage
//! hashes its declared inputs (file contents, the classification table,
//! configuration values) and is rerun only when that digest differs from
//! the manifest record or its published output is missing. Outputs are
//! written to a temporary sibling and renamed on success, so a crash
//! never exposes a partial file and rerunning any stage is always safe.
//!
//! Resolutions share no mutable state beyond the read-only source inputs
//! and the manifest, so they build concurrently in scoped worker
//! threads. A stage failure aborts only the resolution chain containing
//! it; other resolutions proceed independently.

pub mod config;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod hexes;
pub mod inputs;
pub mod manifest;
pub mod municipal;
pub mod population;
pub mod publish;
pub mod tables;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use incident_grid_aggregate::{Diagnostics, join_catalog, join_cells};

pub use crate::config::PipelineConfig;
pub use crate::error::PipelineError;
use crate::config::ExclusionFilter;
use crate::export::GeoJsonSeqSink;
use crate::fingerprint::Fingerprint;
use crate::manifest::{Manifest, StageDiagnostics};

/// Result of one stage in a build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage was stale and rebuilt successfully.
    Built,
    /// Stage was up-to-date and skipped.
    Skipped,
    /// Stage failed; the remainder of its resolution chain was aborted.
    Failed(String),
}

/// One stage outcome in a [`BuildReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub outcomes: Vec<StageOutcome>,
}

impl BuildReport {
    /// Whether any stage failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, StageStatus::Failed(_)))
    }
}

/// Freshness of one stage, as reported by [`status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
    Fresh,
    Stale,
    /// A declared input is missing, so the stage cannot run at all.
    Blocked(String),
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "up-to-date"),
            Self::Stale => write!(f, "stale"),
            Self::Blocked(reason) => write!(f, "blocked: {reason}"),
        }
    }
}

fn lock_manifest(manifest: &Mutex<Manifest>) -> std::sync::MutexGuard<'_, Manifest> {
    manifest.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Output file paths for one resolution's stage chain.
struct ResolutionPaths {
    population: PathBuf,
    aggregated: PathBuf,
    features: PathBuf,
}

impl ResolutionPaths {
    fn new(dir: &Path, res: u8) -> Self {
        Self {
            population: dir.join(format!("population_r{res}.csv")),
            aggregated: dir.join(format!("aggregated_r{res}.csv")),
            features: dir.join(format!("features_r{res}.geojsonseq")),
        }
    }
}

fn population_fingerprint(config: &PipelineConfig, res: u8) -> Result<String, PipelineError> {
    Ok(Fingerprint::new(&format!("population_r{res}"))
        .with_file("population_grid", &config.inputs.population_grid)?
        .with_value("resolution", &res.to_string())
        .finish())
}

fn aggregate_fingerprint(
    config: &PipelineConfig,
    classifier_fp: &str,
    population_table: &Path,
    res: u8,
) -> Result<String, PipelineError> {
    Ok(Fingerprint::new(&format!("aggregate_r{res}"))
        .with_file("incidents", &config.inputs.incidents)?
        .with_file("population_table", population_table)?
        .with_value("classification_table", classifier_fp)
        .with_value("exclude_patterns", &config.exclude_patterns.join("\n"))
        .with_value(
            "rate_min_population",
            &config.reliability.rate_min_population.to_string(),
        )
        .with_value("resolution", &res.to_string())
        .finish())
}

fn export_fingerprint(
    config: &PipelineConfig,
    aggregated_table: &Path,
    res: u8,
) -> Result<String, PipelineError> {
    Ok(Fingerprint::new(&format!("export_r{res}"))
        .with_file("aggregated_table", aggregated_table)?
        .with_value(
            "display_min_population",
            &config.reliability.display_min_population.to_string(),
        )
        .with_value("resolution", &res.to_string())
        .finish())
}

fn municipal_fingerprint(
    config: &PipelineConfig,
    classifier_fp: &str,
) -> Result<String, PipelineError> {
    Ok(Fingerprint::new("municipalities")
        .with_file("incidents", &config.inputs.incidents)?
        .with_file("municipalities", &config.inputs.municipalities)?
        .with_value("classification_table", classifier_fp)
        .with_value("exclude_patterns", &config.exclude_patterns.join("\n"))
        .with_value(
            "rate_min_population",
            &config.reliability.rate_min_population.to_string(),
        )
        .finish())
}

/// Runs one stage with staleness checking and manifest bookkeeping.
fn run_stage<FP, B>(
    manifest: &Mutex<Manifest>,
    dir: &Path,
    stage: &str,
    fingerprint: FP,
    output: &Path,
    force: bool,
    build: B,
) -> StageOutcome
where
    FP: FnOnce() -> Result<String, PipelineError>,
    B: FnOnce() -> Result<Option<StageDiagnostics>, PipelineError>,
{
    let fp = match fingerprint() {
        Ok(fp) => fp,
        Err(e) => {
            log::error!("{stage}: cannot fingerprint inputs: {e}");
            return StageOutcome {
                stage: stage.to_string(),
                status: StageStatus::Failed(e.to_string()),
            };
        }
    };

    let stale = lock_manifest(manifest).is_stale(stage, &fp, output, force);
    if !stale {
        log::info!("{stage}: up-to-date, skipping");
        return StageOutcome {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
        };
    }

    log::info!("{stage}: building");
    match build() {
        Ok(diagnostics) => {
            let mut guard = lock_manifest(manifest);
            guard.record(stage, fp, diagnostics);
            if let Err(e) = guard.save(dir) {
                log::error!("{stage}: failed to save manifest: {e}");
                return StageOutcome {
                    stage: stage.to_string(),
                    status: StageStatus::Failed(e.to_string()),
                };
            }
            StageOutcome {
                stage: stage.to_string(),
                status: StageStatus::Built,
            }
        }
        Err(e) => {
            log::error!("{stage}: failed: {e}");
            StageOutcome {
                stage: stage.to_string(),
                status: StageStatus::Failed(e.to_string()),
            }
        }
    }
}

const fn stage_failed(outcome: &StageOutcome) -> bool {
    matches!(outcome.status, StageStatus::Failed(_))
}

fn diagnostics_record(diagnostics: Diagnostics) -> StageDiagnostics {
    StageDiagnostics {
        mapped: diagnostics.mapped,
        unmapped: diagnostics.unmapped,
        excluded: diagnostics.excluded,
    }
}

/// Builds the three-stage chain for one resolution.
///
/// Stages run strictly in dependency order; the first failure aborts the
/// rest of this chain only.
fn build_resolution(
    config: &PipelineConfig,
    filter: &ExclusionFilter,
    classifier_fp: &str,
    manifest: &Mutex<Manifest>,
    force: bool,
    res_value: u8,
) -> Vec<StageOutcome> {
    let mut outcomes = Vec::new();

    let resolution = match incident_grid_spatial::resolution(res_value) {
        Ok(resolution) => resolution,
        Err(e) => {
            return vec![StageOutcome {
                stage: format!("population_r{res_value}"),
                status: StageStatus::Failed(e.to_string()),
            }];
        }
    };

    let dir = &config.output_dir;
    let paths = ResolutionPaths::new(dir, res_value);
    let thresholds = config.thresholds();

    outcomes.push(run_stage(
        manifest,
        dir,
        &format!("population_r{res_value}"),
        || population_fingerprint(config, res_value),
        &paths.population,
        force,
        || {
            let source_cells = inputs::read_population_grid(&config.inputs.population_grid)?;
            let rows = population::convert_population(&source_cells, resolution);
            tables::write_population_table(&paths.population, &rows)?;
            Ok(None)
        },
    ));
    if outcomes.last().is_some_and(stage_failed) {
        return outcomes;
    }

    outcomes.push(run_stage(
        manifest,
        dir,
        &format!("aggregate_r{res_value}"),
        || aggregate_fingerprint(config, classifier_fp, &paths.population, res_value),
        &paths.aggregated,
        force,
        || {
            let incidents = inputs::read_incidents(&config.inputs.incidents)?;
            let (aggregates, diagnostics) = hexes::aggregate_cells(&incidents, filter, resolution);
            let population = tables::read_population_table(&paths.population)?;
            let units = join_cells(aggregates, &population, thresholds);
            debug_assert!(units.iter().all(incident_grid_models::AggregatedUnit::reconciles));
            tables::write_cell_table(&paths.aggregated, &units)?;
            log::info!(
                "aggregate_r{res_value}: {} mapped, {} unmapped, {} excluded",
                diagnostics.mapped,
                diagnostics.unmapped,
                diagnostics.excluded
            );
            Ok(Some(diagnostics_record(diagnostics)))
        },
    ));
    if outcomes.last().is_some_and(stage_failed) {
        return outcomes;
    }

    outcomes.push(run_stage(
        manifest,
        dir,
        &format!("export_r{res_value}"),
        || export_fingerprint(config, &paths.aggregated, res_value),
        &paths.features,
        force,
        || {
            let units = tables::read_cell_table(&paths.aggregated)?;
            publish::write_atomic(&paths.features, |writer| {
                let mut sink = GeoJsonSeqSink::new(writer);
                let written = export::export_cells(&units, thresholds, &mut sink)?;
                log::info!("export_r{res_value}: wrote {written} features");
                Ok(())
            })?;
            Ok(None)
        },
    ));

    outcomes
}

/// Builds the resolution-independent municipality aggregation stage.
fn build_municipal(
    config: &PipelineConfig,
    filter: &ExclusionFilter,
    classifier_fp: &str,
    manifest: &Mutex<Manifest>,
    force: bool,
) -> StageOutcome {
    let dir = &config.output_dir;
    let output = dir.join("aggregated_municipalities.csv");
    let thresholds = config.thresholds();

    run_stage(
        manifest,
        dir,
        "municipalities",
        || municipal_fingerprint(config, classifier_fp),
        &output,
        force,
        || {
            let incidents = inputs::read_incidents(&config.inputs.incidents)?;
            let catalog = inputs::read_municipalities(&config.inputs.municipalities)?;
            let (aggregates, diagnostics) =
                municipal::aggregate_municipalities(&incidents, filter, &catalog);
            let units = join_catalog(&catalog, aggregates, thresholds);
            debug_assert!(units.len() == catalog.len());
            tables::write_municipality_table(&output, &units, &catalog)?;
            log::info!(
                "municipalities: {} mapped, {} unmapped, {} excluded",
                diagnostics.mapped,
                diagnostics.unmapped,
                diagnostics.excluded
            );
            Ok(Some(diagnostics_record(diagnostics)))
        },
    )
}

/// Runs the full pipeline: every configured resolution concurrently,
/// plus the municipality stage.
///
/// A stage failure aborts only its own resolution chain; the report
/// carries one outcome per attempted stage.
///
/// # Errors
///
/// Returns an error only for run-level problems (invalid exclusion
/// patterns, unwritable output directory). Per-stage failures are
/// reported in the [`BuildReport`] instead.
pub fn run(config: &PipelineConfig, force: bool) -> Result<BuildReport, PipelineError> {
    let filter = config.exclusion_filter()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let classifier_fp = incident_grid_classify::table_fingerprint();
    let manifest = Mutex::new(Manifest::load(&config.output_dir));

    let mut outcomes = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = config
            .resolutions
            .iter()
            .map(|&res| {
                let filter = &filter;
                let classifier_fp = &classifier_fp;
                let manifest = &manifest;
                (
                    res,
                    scope.spawn(move || {
                        build_resolution(config, filter, classifier_fp, manifest, force, res)
                    }),
                )
            })
            .collect();

        let municipal_handle =
            scope.spawn(|| build_municipal(config, &filter, &classifier_fp, &manifest, force));

        for (res, handle) in handles {
            match handle.join() {
                Ok(mut resolution_outcomes) => outcomes.append(&mut resolution_outcomes),
                Err(_) => outcomes.push(StageOutcome {
                    stage: format!("resolution_{res}"),
                    status: StageStatus::Failed("worker thread panicked".to_string()),
                }),
            }
        }
        match municipal_handle.join() {
            Ok(outcome) => outcomes.push(outcome),
            Err(_) => outcomes.push(StageOutcome {
                stage: "municipalities".to_string(),
                status: StageStatus::Failed("worker thread panicked".to_string()),
            }),
        }
    });

    Ok(BuildReport { outcomes })
}

/// Reports the freshness of every stage without building anything.
///
/// # Errors
///
/// Returns an error if the exclusion patterns fail to compile.
pub fn status(config: &PipelineConfig) -> Result<Vec<(String, StageState)>, PipelineError> {
    config.exclusion_filter()?;
    let classifier_fp = incident_grid_classify::table_fingerprint();
    let manifest = Manifest::load(&config.output_dir);
    let dir = &config.output_dir;

    let mut lines = Vec::new();
    let mut push = |stage: String, fp: Result<String, PipelineError>, output: &Path| {
        let state = match fp {
            Ok(fp) => {
                if manifest.is_stale(&stage, &fp, output, false) {
                    StageState::Stale
                } else {
                    StageState::Fresh
                }
            }
            Err(e) => StageState::Blocked(e.to_string()),
        };
        lines.push((stage, state));
    };

    for &res in &config.resolutions {
        let paths = ResolutionPaths::new(dir, res);
        push(
            format!("population_r{res}"),
            population_fingerprint(config, res),
            &paths.population,
        );
        push(
            format!("aggregate_r{res}"),
            aggregate_fingerprint(config, &classifier_fp, &paths.population, res),
            &paths.aggregated,
        );
        push(
            format!("export_r{res}"),
            export_fingerprint(config, &paths.aggregated, res),
            &paths.features,
        );
    }
    push(
        "municipalities".to_string(),
        municipal_fingerprint(config, &classifier_fp),
        &dir.join("aggregated_municipalities.csv"),
    );

    Ok(lines)
}
