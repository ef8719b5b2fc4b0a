use std::path::PathBuf;

use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use dtseries_svd::{
    config, BatchSvdRunner, DiskTimeseriesSource, FetchOptions, RunOptions, RunnerConfig,
    ThreadSafeStdError,
};

/// For each subject-run pair of this partition: gets the preprocessed dense
/// timeseries, centers it, computes its SVD, and saves the factors.
#[derive(Parser)]
#[command(name = "svd_dtseries", version)]
struct Cli {
    /// Task id assigned by the batch scheduler; selects the manifest line
    /// for this shard.
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    shard_index: u32,

    /// Save preprocessing plots while the timeseries is prepared.
    #[arg(long)]
    save_plots: bool,

    /// Compute all SVDs, even if a subject-run bundle already exists in the
    /// result directory.
    #[arg(long)]
    allow_recomputing: bool,

    /// Limit the size of the noise mask during preprocessing. No limit by
    /// default.
    #[arg(long, value_name = "SIZE")]
    noise_size_limit: Option<usize>,

    /// Data root holding the partition manifest, the preprocessed
    /// timeseries, and the result directory.
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_DATA_ROOT)]
    data_dir: PathBuf,
}

fn main() -> Result<(), ThreadSafeStdError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runner_config = RunnerConfig::from_data_root(&cli.data_dir);
    let source = DiskTimeseriesSource::new(runner_config.dtseries_dir.clone());
    let runner = BatchSvdRunner::new(&runner_config, &source);
    let options = RunOptions {
        allow_recomputing: cli.allow_recomputing,
        fetch: FetchOptions {
            save_plots: cli.save_plots,
            noise_size_limit: cli.noise_size_limit,
        },
    };

    let summary = runner.run(cli.shard_index as usize, &options)?;
    info!(
        "shard {} finished: {} processed, {} skipped, {} fetch failures",
        cli.shard_index, summary.processed, summary.skipped, summary.fetch_failures
    );
    Ok(())
}
