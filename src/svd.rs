//! Full singular value decomposition with a blocked path for large
//! matrices.
//!
//! Matrices that fit a single block go straight to LAPACK. Anything larger
//! takes the Gram route on the tall orientation: MᵀM is accumulated over
//! fixed-extent row blocks in parallel, eigendecomposed, and U is recovered
//! block by block as M·V·Σ⁻¹. Only the small Gram matrix and the three
//! factors are ever materialized alongside the input.

use log::{debug, info};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Eigh, SVDInto, UPLO};
use rayon::prelude::*;

use crate::ThreadSafeStdError;

/// Relative floor under which a singular value is treated as zero when
/// recovering U. Columns below the floor are zero-filled instead of being
/// divided into numerical noise.
const RELATIVE_SINGULAR_VALUE_FLOOR: f64 = 1e-12;

/// The three factors of a reduced SVD: `u` is m×k, `s` holds the k
/// singular values in descending order, `vt` is k×n, with k = min(m, n).
#[derive(Clone, Debug)]
pub struct SvdFactors {
    pub u: Array2<f64>,
    pub s: Array1<f64>,
    pub vt: Array2<f64>,
}

/// Full SVD sized for large dense matrices, partitioned into blocks of
/// fixed row/column extents.
#[derive(Clone, Copy, Debug)]
pub struct BlockedSvd {
    row_block_extent: usize,
    col_block_extent: usize,
}

impl BlockedSvd {
    /// # Errors
    ///
    /// Returns an error if either block extent is zero.
    pub fn new(row_block_extent: usize, col_block_extent: usize) -> Result<Self, ThreadSafeStdError> {
        if row_block_extent == 0 || col_block_extent == 0 {
            return Err("block extents must be greater than zero".into());
        }
        Ok(BlockedSvd {
            row_block_extent,
            col_block_extent,
        })
    }

    /// Computes the reduced SVD of `matrix`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix is empty or a LAPACK routine fails.
    pub fn compute(&self, matrix: Array2<f64>) -> Result<SvdFactors, ThreadSafeStdError> {
        let (num_rows, num_cols) = matrix.dim();
        if num_rows == 0 || num_cols == 0 {
            return Err("cannot decompose a matrix with zero rows or zero columns".into());
        }

        if num_rows <= self.row_block_extent && num_cols <= self.col_block_extent {
            debug!(
                "matrix {}x{} fits one {}x{} block, using the direct path",
                num_rows, num_cols, self.row_block_extent, self.col_block_extent
            );
            return direct_svd(matrix);
        }

        info!(
            "blocked SVD of a {}x{} matrix ({} rows per block)",
            num_rows, num_cols, self.row_block_extent
        );
        if num_rows >= num_cols {
            gram_svd_tall(matrix.view(), self.row_block_extent)
        } else {
            // Decompose the transpose, which is tall, then swap the factors:
            // if Mᵀ = U'ΣV'ᵀ then M = V'ΣU'ᵀ. Row blocks of Mᵀ are column
            // blocks of M, so the column extent applies.
            let dual = gram_svd_tall(matrix.t(), self.col_block_extent)?;
            Ok(SvdFactors {
                u: dual.vt.reversed_axes(),
                s: dual.s,
                vt: dual.u.reversed_axes(),
            })
        }
    }
}

/// Direct LAPACK decomposition for matrices that fit a single block.
fn direct_svd(matrix: Array2<f64>) -> Result<SvdFactors, ThreadSafeStdError> {
    let (num_rows, num_cols) = matrix.dim();
    let k = num_rows.min(num_cols);
    let (u_opt, s, vt_opt) = matrix
        .svd_into(true, true)
        .map_err(|e| format!("SVD failed: {}", e))?;
    let u = u_opt.ok_or("SVD did not return the left singular vectors")?;
    let vt = vt_opt.ok_or("SVD did not return the right singular vectors")?;
    // LAPACK may hand back the full square factors; keep the reduced ones.
    Ok(SvdFactors {
        u: u.slice(s![.., ..k]).to_owned(),
        s,
        vt: vt.slice(s![..k, ..]).to_owned(),
    })
}

/// Gram-path decomposition of a tall (rows >= columns) matrix view.
///
/// Accumulates the column Gram matrix over row blocks in parallel,
/// eigendecomposes it, and recovers U one row block at a time.
fn gram_svd_tall(
    matrix: ArrayView2<'_, f64>,
    row_block_extent: usize,
) -> Result<SvdFactors, ThreadSafeStdError> {
    let (num_rows, num_cols) = matrix.dim();

    let gram = matrix
        .axis_chunks_iter(Axis(0), row_block_extent)
        .into_par_iter()
        .fold(
            || Array2::<f64>::zeros((num_cols, num_cols)),
            |mut acc, block| {
                acc += &block.t().dot(&block);
                acc
            },
        )
        .reduce(
            || Array2::<f64>::zeros((num_cols, num_cols)),
            |mut acc, partial| {
                acc += &partial;
                acc
            },
        );

    let (eigenvalues, eigenvectors) = gram
        .eigh(UPLO::Upper)
        .map_err(|e| format!("eigendecomposition of the Gram matrix failed: {}", e))?;

    // LAPACK returns eigenvalues ascending; singular values go descending.
    let mut order: Vec<usize> = (0..num_cols).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let singular_values =
        Array1::from_iter(order.iter().map(|&idx| eigenvalues[idx].max(0.0).sqrt()));
    let mut v = Array2::<f64>::zeros((num_cols, num_cols));
    for (new_idx, &old_idx) in order.iter().enumerate() {
        v.column_mut(new_idx).assign(&eigenvectors.column(old_idx));
    }

    // U = M · V · Σ⁻¹, with null directions zero-filled.
    let sigma_floor = singular_values[0] * RELATIVE_SINGULAR_VALUE_FLOOR;
    let mut v_over_sigma = v.clone();
    for (col_idx, mut column) in v_over_sigma.columns_mut().into_iter().enumerate() {
        let sigma = singular_values[col_idx];
        if sigma > sigma_floor && sigma > 0.0 {
            column.mapv_inplace(|value| value / sigma);
        } else {
            column.fill(0.0);
        }
    }

    let mut u = Array2::<f64>::zeros((num_rows, num_cols));
    u.axis_chunks_iter_mut(Axis(0), row_block_extent)
        .into_par_iter()
        .enumerate()
        .for_each(|(block_idx, mut u_block)| {
            let row_start = block_idx * row_block_extent;
            let row_end = row_start + u_block.nrows();
            let matrix_block = matrix.slice(s![row_start..row_end, ..]);
            u_block.assign(&matrix_block.dot(&v_over_sigma));
        });

    Ok(SvdFactors {
        u,
        s: singular_values,
        vt: v.reversed_axes(),
    })
}
