//! The seam to the preprocessing collaborator.
//!
//! Preprocessing itself (noise masking, diagnostic plots) happens upstream
//! and is out of scope here; the runner only needs something that hands it
//! a dense timeseries matrix per unit. `TimeseriesSource` is that seam, and
//! `DiskTimeseriesSource` is the concrete implementation reading matrices
//! the pipeline already wrote to disk.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;

use crate::units::SubjectRun;
use crate::ThreadSafeStdError;

/// Fixed artifact token + extension of a preprocessed timeseries matrix.
pub const DTSERIES_ARTIFACT_SUFFIX: &str = "dtseries.bin";

/// Options forwarded through the seam to preprocessing.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchOptions {
    /// Save diagnostic plots while the timeseries is prepared.
    pub save_plots: bool,
    /// Upper bound on the noise-mask size. `None` means no limit.
    pub noise_size_limit: Option<usize>,
}

/// Provides the preprocessed dense timeseries matrix for a unit,
/// rows = spatial units, columns = time points.
pub trait TimeseriesSource: Sync {
    /// # Errors
    ///
    /// Any failure to produce the matrix, including the run not existing
    /// for that subject. The runner treats these as recoverable and moves
    /// on to the next unit.
    fn fetch(
        &self,
        unit: &SubjectRun,
        options: &FetchOptions,
    ) -> Result<Array2<f64>, ThreadSafeStdError>;
}

/// Reads preprocessed matrices from `<subject>-<run>-dtseries.bin` files.
#[derive(Clone, Debug)]
pub struct DiskTimeseriesSource {
    dtseries_dir: PathBuf,
}

impl DiskTimeseriesSource {
    pub fn new(dtseries_dir: impl Into<PathBuf>) -> Self {
        DiskTimeseriesSource {
            dtseries_dir: dtseries_dir.into(),
        }
    }

    /// The path a unit's preprocessed matrix is expected at.
    pub fn matrix_path(&self, unit: &SubjectRun) -> PathBuf {
        self.dtseries_dir.join(format!(
            "{}-{}-{}",
            unit.subject, unit.run, DTSERIES_ARTIFACT_SUFFIX
        ))
    }
}

impl TimeseriesSource for DiskTimeseriesSource {
    fn fetch(
        &self,
        unit: &SubjectRun,
        options: &FetchOptions,
    ) -> Result<Array2<f64>, ThreadSafeStdError> {
        if options.save_plots || options.noise_size_limit.is_some() {
            // These options steer the upstream preprocessing run; matrices
            // on disk are read as stored.
            debug!(
                "fetch options (save_plots: {}, noise_size_limit: {:?}) apply upstream of stored matrices",
                options.save_plots, options.noise_size_limit
            );
        }
        let path = self.matrix_path(unit);
        let matrix = read_dense_timeseries(&path)
            .map_err(|e| format!("no preprocessed timeseries for {}: {}", unit, e))?;
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(format!("preprocessed timeseries for {} is empty", unit).into());
        }
        Ok(matrix)
    }
}

/// Reads one bincode-encoded dense timeseries matrix.
pub fn read_dense_timeseries(path: &Path) -> Result<Array2<f64>, ThreadSafeStdError> {
    let file =
        File::open(path).map_err(|e| format!("failed to open matrix file at {:?}: {}", path, e))?;
    let mut reader = BufReader::new(file);
    let matrix: Array2<f64> =
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| format!("failed to deserialize matrix at {:?}: {}", path, e))?;
    Ok(matrix)
}

/// Writes one dense timeseries matrix the way `read_dense_timeseries`
/// expects it; the producer side of the interchange format.
pub fn write_dense_timeseries(path: &Path, matrix: &Array2<f64>) -> Result<(), ThreadSafeStdError> {
    let file = File::create(path)
        .map_err(|e| format!("failed to create matrix file at {:?}: {}", path, e))?;
    let mut writer = BufWriter::new(file);
    bincode::serde::encode_into_std_write(matrix, &mut writer, bincode::config::standard())
        .map_err(|e| format!("failed to serialize matrix to {:?}: {}", path, e))?;
    Ok(())
}
