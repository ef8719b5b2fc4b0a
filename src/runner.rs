//! The Batch SVD Runner.
//!
//! Resolves the work list for a shard, filters against already-completed
//! outputs, and processes the remaining units sequentially:
//! fetch → center → decompose → persist.
//!
//! Error handling is two-tier. A fetch failure is caught, logged with unit
//! context, and the loop moves on; the run tolerates runs that do not exist
//! for a subject. Failures in centering, decomposition, or persistence
//! propagate and abort the remaining units of the shard.

use std::fs;

use log::{info, warn};

use crate::bundle::{bundle_file_name, SvdBundle};
use crate::center::doubly_center;
use crate::config::RunnerConfig;
use crate::manifest::PartitionManifest;
use crate::registry::CompletedRegistry;
use crate::svd::BlockedSvd;
use crate::timeseries::{FetchOptions, TimeseriesSource};
use crate::ThreadSafeStdError;

/// Per-invocation options from the command line.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Disables the completion filter: existing bundles are recomputed and
    /// overwritten.
    pub allow_recomputing: bool,
    /// Forwarded to the preprocessing collaborator.
    pub fetch: FetchOptions,
}

/// What happened to the candidate units of one shard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Units decomposed and persisted in this invocation.
    pub processed: usize,
    /// Units skipped because their bundle already existed.
    pub skipped: usize,
    /// Units whose timeseries could not be obtained.
    pub fetch_failures: usize,
}

/// Orchestrates one shard's batch of subject-run units.
pub struct BatchSvdRunner<'a, S: TimeseriesSource> {
    config: &'a RunnerConfig,
    source: &'a S,
}

impl<'a, S: TimeseriesSource> BatchSvdRunner<'a, S> {
    pub fn new(config: &'a RunnerConfig, source: &'a S) -> Self {
        BatchSvdRunner { config, source }
    }

    /// Processes every candidate unit of the 1-indexed shard.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be resolved for the shard,
    /// or if centering, decomposition, or persistence fails for any unit.
    pub fn run(&self, shard_index: usize, options: &RunOptions) -> Result<RunSummary, ThreadSafeStdError> {
        let manifest = PartitionManifest::load(&self.config.manifest_path)?;
        let work_list = manifest.resolve_work_list(shard_index, &self.config.runs)?;
        info!(
            "shard {}: {} candidate units from {} runs per subject",
            shard_index,
            work_list.len(),
            self.config.runs.len()
        );

        fs::create_dir_all(&self.config.svd_dir).map_err(|e| {
            format!(
                "failed to create result directory {:?}: {}",
                self.config.svd_dir, e
            )
        })?;
        let registry = CompletedRegistry::scan(&self.config.svd_dir)?;
        let svd = BlockedSvd::new(self.config.row_block_extent, self.config.col_block_extent)?;

        let mut summary = RunSummary::default();
        for unit in &work_list {
            if registry.contains(unit) && !options.allow_recomputing {
                info!(
                    "the SVD for {} is already in {}; pass --allow-recomputing to recompute",
                    unit,
                    self.config.svd_dir.display()
                );
                summary.skipped += 1;
                continue;
            }

            info!("getting preprocessed dense timeseries for {}", unit);
            let mut matrix = match self.source.fetch(unit, &options.fetch) {
                Ok(matrix) => matrix,
                Err(error) => {
                    warn!(
                        "could not obtain the timeseries for {}: {}; this run probably does not exist for this subject",
                        unit, error
                    );
                    summary.fetch_failures += 1;
                    continue;
                }
            };

            info!("centering {}x{} matrix for {}", matrix.nrows(), matrix.ncols(), unit);
            doubly_center(&mut matrix)?;

            info!("computing SVD for {}", unit);
            let factors = svd.compute(matrix)?;

            let bundle_path = self.config.svd_dir.join(bundle_file_name(unit));
            info!("saving bundle to {}", bundle_path.display());
            SvdBundle::from(factors).save(&bundle_path)?;

            info!("done {}", unit);
            summary.processed += 1;
        }
        Ok(summary)
    }
}
