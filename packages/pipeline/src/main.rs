#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incident_grid_pipeline::{PipelineConfig, StageStatus, run, status};

#[derive(Parser)]
#[command(about = "Builds aggregated incident tables and feature streams")]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds every stale stage.
    Build {
        /// Rebuilds every stage regardless of staleness.
        #[arg(long)]
        force: bool,
    },
    /// Reports the freshness of every stage without building.
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)?;

    match cli.command {
        Commands::Build { force } => {
            let report = run(&config, force)?;
            for outcome in &report.outcomes {
                let status = match &outcome.status {
                    StageStatus::Built => "built".to_string(),
                    StageStatus::Skipped => "skipped".to_string(),
                    StageStatus::Failed(reason) => format!("failed: {reason}"),
                };
                println!("{}: {status}", outcome.stage);
            }
            if report.has_failures() {
                return Err("one or more stages failed".into());
            }
        }
        Commands::Status => {
            for (stage, state) in status(&config)? {
                println!("{stage}: {state}");
            }
        }
    }

    Ok(())
}
