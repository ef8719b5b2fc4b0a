//! Persisted SVD bundles.
//!
//! One bundle per completed (subject, run) unit, written to the result
//! directory as `<subject>-<run>-svd.bin`. This module owns that naming on
//! both sides: building the filename for a write and parsing directory
//! entries back into units for the completion filter.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::svd::SvdFactors;
use crate::units::{Run, SubjectId, SubjectRun};
use crate::ThreadSafeStdError;

/// Fixed artifact token + extension of a persisted bundle.
pub const SVD_ARTIFACT_SUFFIX: &str = "svd.bin";

/// The filename a unit's bundle is stored under.
pub fn bundle_file_name(unit: &SubjectRun) -> String {
    format!("{}-{}-{}", unit.subject, unit.run, SVD_ARTIFACT_SUFFIX)
}

/// Parses a result-directory filename back into its unit. Returns `None`
/// for anything that is not a bundle name.
pub fn parse_bundle_file_name(file_name: &str) -> Option<SubjectRun> {
    let parts: Vec<&str> = file_name.split('-').collect();
    if parts.len() != 3 || parts[2] != SVD_ARTIFACT_SUFFIX || parts[0].is_empty() {
        return None;
    }
    let run = Run::from_str(parts[1]).ok()?;
    Some(SubjectRun {
        subject: SubjectId(parts[0].to_string()),
        run,
    })
}

/// The three persisted factors of one unit's decomposition.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SvdBundle {
    /// Left singular vectors, m×k.
    pub u: Array2<f64>,
    /// Singular values, length k, descending.
    pub s: Array1<f64>,
    /// Right singular vectors transposed, k×n.
    pub vt: Array2<f64>,
}

impl From<SvdFactors> for SvdBundle {
    fn from(factors: SvdFactors) -> Self {
        SvdBundle {
            u: factors.u,
            s: factors.s,
            vt: factors.vt,
        }
    }
}

impl SvdBundle {
    /// Writes the bundle with bincode, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or serialization
    /// fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ThreadSafeStdError> {
        let file = File::create(path.as_ref())
            .map_err(|e| format!("failed to create bundle file at {:?}: {}", path.as_ref(), e))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| format!("failed to serialize SVD bundle: {}", e))?;
        Ok(())
    }

    /// Reads a bundle previously written with `save` and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if file I/O or deserialization fails, if the factor
    /// dimensions disagree, or if the singular values are not finite,
    /// non-negative, and non-increasing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ThreadSafeStdError> {
        let file = File::open(path.as_ref())
            .map_err(|e| format!("failed to open bundle file at {:?}: {}", path.as_ref(), e))?;
        let mut reader = BufReader::new(file);
        let bundle: SvdBundle =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| format!("failed to deserialize SVD bundle: {}", e))?;

        let k = bundle.s.len();
        if bundle.u.ncols() != k || bundle.vt.nrows() != k {
            return Err(format!(
                "loaded bundle has inconsistent factor dimensions: u is {:?}, s has length {}, vt is {:?}",
                bundle.u.dim(),
                k,
                bundle.vt.dim()
            )
            .into());
        }
        if bundle.s.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err("loaded bundle has non-finite or negative singular values".into());
        }
        if bundle.s.as_slice().map_or(false, |values| {
            values.windows(2).any(|pair| pair[0] < pair[1])
        }) {
            return Err("loaded bundle has singular values out of descending order".into());
        }
        Ok(bundle)
    }

    /// Multiplies the factors back together, `U·diag(S)·Vᵀ`.
    pub fn reconstruct(&self) -> Array2<f64> {
        self.u.dot(&Array2::from_diag(&self.s)).dot(&self.vt)
    }
}
