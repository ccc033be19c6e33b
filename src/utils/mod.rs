use anyhow::bail;
use ndarray::{ArrayView1, ArrayView2, Axis};
use num_traits::Zero;

/// Axis along which a dense operation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ROW,
    COLUMN,
}

/// Checks that a signal matrix and a dictionary agree on the signal size.
pub(crate) fn check_signal_dictionary(
    y: &ArrayView2<f64>,
    dictionary: &ArrayView2<f64>,
) -> anyhow::Result<()> {
    if y.nrows() != dictionary.nrows() {
        bail!(
            "Signal size of Y ({}) does not match signal size of the dictionary ({})",
            y.nrows(),
            dictionary.nrows()
        );
    }
    Ok(())
}

/// Checks that the code matrix is (n_atoms x n_samples) for the given signals and dictionary.
pub(crate) fn check_codes(
    y: &ArrayView2<f64>,
    dictionary: &ArrayView2<f64>,
    codes: &ArrayView2<f64>,
) -> anyhow::Result<()> {
    check_signal_dictionary(y, dictionary)?;
    if codes.nrows() != dictionary.ncols() {
        bail!(
            "Number of code rows ({}) does not match number of atoms ({})",
            codes.nrows(),
            dictionary.ncols()
        );
    }
    if codes.ncols() != y.ncols() {
        bail!(
            "Number of code columns ({}) does not match number of samples ({})",
            codes.ncols(),
            y.ncols()
        );
    }
    Ok(())
}

pub(crate) fn count_nonzero<T: Zero + PartialEq + Copy>(values: ArrayView1<T>) -> usize {
    values.iter().filter(|&&v| v != T::zero()).count()
}

/// Number of nonzero entries in every column.
pub fn nonzero_per_column<T: Zero + PartialEq + Copy>(x: ArrayView2<T>) -> Vec<usize> {
    x.axis_iter(Axis(1)).map(count_nonzero).collect()
}
