//! # Sparse coding
//!
//! Given a fixed dictionary `D` (signal_size × n_atoms) and signals `Y`
//! (signal_size × n_samples), a sparse coder produces codes `X`
//! (n_atoms × n_samples) with `Y ≈ D X` and few nonzeros per column.
//!
//! ## Available coders
//! - [`Omp`]: Orthogonal Matching Pursuit, at most `k` nonzeros per column
//! - [`Lasso`]: L1-penalized least squares by coordinate descent
//! - [`ForwardBackward`]: proximal gradient with hard (`k` largest) or soft (L1) thresholding
//!
//! `Omp` and `Lasso` code the columns in parallel; every column only reads the
//! shared Gram matrix and writes its own output column.

use anyhow::bail;
use ndarray::{Array1, Array2, ArrayView2};

use crate::utils::check_codes;

mod forward_backward;
mod lasso;
mod omp;

pub use forward_backward::{ForwardBackward, Penalty};
pub use lasso::Lasso;
pub use omp::Omp;

/// An algorithm producing sparse codes for signals over a fixed dictionary.
pub trait SparseCoder: Send + Sync {
    /// Codes `y` over `dictionary`.
    ///
    /// `warm_start`, when given, must be (n_atoms × n_samples); coders that
    /// iterate start from it, the others ignore it.
    fn encode(
        &self,
        y: ArrayView2<f64>,
        dictionary: ArrayView2<f64>,
        warm_start: Option<ArrayView2<f64>>,
    ) -> anyhow::Result<Array2<f64>>;
}

pub(crate) fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

pub(crate) fn check_warm_start(
    y: &ArrayView2<f64>,
    dictionary: &ArrayView2<f64>,
    warm_start: &Option<ArrayView2<f64>>,
) -> anyhow::Result<()> {
    if let Some(x0) = warm_start {
        check_codes(y, dictionary, x0)?;
    }
    Ok(())
}

/// Stacks per-sample code vectors into an (n_atoms × n_samples) matrix.
pub(crate) fn assemble_columns(
    n_atoms: usize,
    columns: Vec<Array1<f64>>,
) -> anyhow::Result<Array2<f64>> {
    let mut codes = Array2::zeros((n_atoms, columns.len()));
    for (j, column) in columns.into_iter().enumerate() {
        if column.len() != n_atoms {
            bail!(
                "Code column {} has length {}, expected {}",
                j,
                column.len(),
                n_atoms
            );
        }
        codes.column_mut(j).assign(&column);
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
        assert_eq!(soft_threshold(0.25, 0.0), 0.25);
    }

    #[test]
    fn test_assemble_columns() {
        let codes = assemble_columns(2, vec![array![1.0, 2.0], array![3.0, 4.0]]).unwrap();
        assert_eq!(codes, array![[1.0, 3.0], [2.0, 4.0]]);

        assert!(assemble_columns(3, vec![array![1.0, 2.0]]).is_err());
    }
}
