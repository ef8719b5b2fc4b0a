//! Runner configuration.
//!
//! Everything the batch loop needs to know about its environment lives here:
//! where the partition manifest and the result directory are, which
//! acquisition runs make up a unit, and how large the blocks of the
//! decomposition are. Defaults reproduce the conventional cluster layout.

use std::path::{Path, PathBuf};

use crate::units::Run;

/// Conventional data root on the compute cluster. Override with
/// `--data-dir` or by building the config by hand.
pub const DEFAULT_DATA_ROOT: &str = "/projectnb/bohland/HCP/data";

/// Manifest file under the data root: one line per shard, tab-separated
/// subject identifiers.
pub const MANIFEST_FILE_NAME: &str = "id_partitions.txt";

/// Result directory under the data root, one bundle per completed unit.
pub const SVD_DIR_NAME: &str = "svds";

/// Directory under the data root holding preprocessed dense timeseries.
pub const DTSERIES_DIR_NAME: &str = "dtseries";

/// Default block extents for the decomposition, rows x columns.
pub const DEFAULT_ROW_BLOCK_EXTENT: usize = 4000;
pub const DEFAULT_COL_BLOCK_EXTENT: usize = 1200;

/// Configuration for one batch invocation.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Path of the partition manifest.
    pub manifest_path: PathBuf,
    /// Directory the SVD bundles are written to and scanned from.
    pub svd_dir: PathBuf,
    /// Directory the disk-backed timeseries source reads from.
    pub dtseries_dir: PathBuf,
    /// Acquisition runs crossed with each subject of the shard, in the
    /// order they are processed.
    pub runs: Vec<Run>,
    /// Number of matrix rows per block during the decomposition.
    pub row_block_extent: usize,
    /// Number of matrix columns per block during the decomposition.
    pub col_block_extent: usize,
}

impl RunnerConfig {
    /// Derives the conventional layout from a data root directory.
    pub fn from_data_root(data_root: impl AsRef<Path>) -> Self {
        let data_root = data_root.as_ref();
        RunnerConfig {
            manifest_path: data_root.join(MANIFEST_FILE_NAME),
            svd_dir: data_root.join(SVD_DIR_NAME),
            dtseries_dir: data_root.join(DTSERIES_DIR_NAME),
            runs: Run::ALL.to_vec(),
            row_block_extent: DEFAULT_ROW_BLOCK_EXTENT,
            col_block_extent: DEFAULT_COL_BLOCK_EXTENT,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig::from_data_root(DEFAULT_DATA_ROOT)
    }
}
