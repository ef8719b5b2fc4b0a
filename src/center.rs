//! Double mean-centering of a dense timeseries matrix.

use ndarray::{Axis, Array2, Zip};
use rayon::prelude::*;

use crate::ThreadSafeStdError;

/// Removes additive row and column bias in place: every entry becomes
/// `x[i][j] - row_mean[i] - col_mean[j] + grand_mean`.
///
/// After one application both the row means and the column means of the
/// matrix are zero, so applying it again changes nothing.
///
/// # Errors
///
/// Returns an error if the matrix has zero rows or zero columns.
pub fn doubly_center(matrix: &mut Array2<f64>) -> Result<(), ThreadSafeStdError> {
    let row_means = matrix
        .mean_axis(Axis(1))
        .ok_or("cannot center a matrix with zero columns")?;
    let col_means = matrix
        .mean_axis(Axis(0))
        .ok_or("cannot center a matrix with zero rows")?;
    let grand_mean = matrix.mean().ok_or("cannot center an empty matrix")?;

    matrix
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row_idx, mut row)| {
            let row_mean = row_means[row_idx];
            Zip::from(row.view_mut())
                .and(col_means.view())
                .for_each(|value, &col_mean| {
                    *value = *value - row_mean - col_mean + grand_mean;
                });
        });
    Ok(())
}
