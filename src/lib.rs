//! Continuous-integration fuzzing: build a project's fuzz targets at a
//! given revision, run each for a bounded time, and surface the first
//! detected defect together with its reproducing input.

#[macro_use]
extern crate lazy_static;

use anyhow::Context;

pub mod batch;
pub mod builder;
pub mod config;
pub mod discover;
pub mod engine;
pub mod status;
pub mod supervisor;
pub mod target;
pub mod utils;

#[cfg(test)]
mod testutil;

pub use batch::{BatchOrchestrator, BatchResult, RunPolicy};
pub use builder::BuildConfig;
pub use config::Config;
pub use target::{FuzzTarget, RunOutcome};

/// Clones and builds the project's fuzzers into the workspace out dir.
pub fn build_fuzzers(config: &BuildConfig) -> anyhow::Result<()> {
    builder::build_fuzzers(config)
        .with_context(|| format!("failed to build fuzzers for {}", config.project_name))
}

/// Runs every fuzz target found in the build out dir. An `Err` means the
/// run infrastructure broke; found bugs are reported through the result.
pub fn run_fuzzers(config: &Config) -> anyhow::Result<BatchResult> {
    config.check().context("invalid config")?;

    let paths = discover::fuzz_targets(&config.out_dir)
        .with_context(|| format!("failed to scan {}", config.out_dir.display()))?;
    if paths.is_empty() {
        log::warn!("no fuzz targets found in {}", config.out_dir.display());
        return Ok(BatchResult::default());
    }
    log::info!("found {} fuzz target(s)", paths.len());

    let targets = paths
        .into_iter()
        .map(|path| FuzzTarget::new(&config.project_name, path, config.fuzz_duration()))
        .collect();
    BatchOrchestrator::new(config, targets)
        .run()
        .context("batch run failed")
}
