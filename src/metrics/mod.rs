//! Reconstruction error and sparsity statistics for `Y ≈ D X`.

use ndarray::{Array2, ArrayView2};

use crate::utils::{check_codes, nonzero_per_column};

/// Residual `Y - D X`.
pub fn residual(
    y: ArrayView2<f64>,
    dictionary: ArrayView2<f64>,
    codes: ArrayView2<f64>,
) -> anyhow::Result<Array2<f64>> {
    check_codes(&y, &dictionary, &codes)?;
    Ok(&y - &dictionary.dot(&codes))
}

/// Squared Frobenius norm of the residual, `||Y - D X||^2`.
pub fn reconstruction_error(
    y: ArrayView2<f64>,
    dictionary: ArrayView2<f64>,
    codes: ArrayView2<f64>,
) -> anyhow::Result<f64> {
    let r = residual(y, dictionary, codes)?;
    Ok(r.iter().map(|v| v * v).sum())
}

/// `||Y - D X||^2 / ||Y||^2`. Zero signals give a relative error of zero.
pub fn relative_reconstruction_error(
    y: ArrayView2<f64>,
    dictionary: ArrayView2<f64>,
    codes: ArrayView2<f64>,
) -> anyhow::Result<f64> {
    let error = reconstruction_error(y, dictionary, codes)?;
    let energy: f64 = y.iter().map(|v| v * v).sum();
    if energy == 0.0 {
        return Ok(0.0);
    }
    Ok(error / energy)
}

/// Root mean squared error per matrix entry.
pub fn rmse(
    y: ArrayView2<f64>,
    dictionary: ArrayView2<f64>,
    codes: ArrayView2<f64>,
) -> anyhow::Result<f64> {
    let error = reconstruction_error(y, dictionary, codes)?;
    if y.is_empty() {
        return Ok(0.0);
    }
    Ok((error / y.len() as f64).sqrt())
}

/// Average number of nonzero coefficients per code column.
pub fn mean_sparsity(codes: ArrayView2<f64>) -> f64 {
    let counts = nonzero_per_column(codes);
    if counts.is_empty() {
        return 0.0;
    }
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

/// Append-only sequence of reconstruction errors, one per evaluation point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorHistory {
    values: Vec<f64>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ErrorHistory {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, error: f64) {
        self.values.push(error);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Values after skipping the first `burn_in` evaluations.
    pub fn after_burn_in(&self, burn_in: usize) -> &[f64] {
        &self.values[burn_in.min(self.values.len())..]
    }

    /// `log10` of every recorded error, the scale learning curves are usually read on.
    pub fn log10(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.log10()).collect()
    }

    /// True when no evaluation increased the error by more than `tolerance` (relative).
    pub fn is_non_increasing(&self, tolerance: f64) -> bool {
        self.values
            .windows(2)
            .all(|w| w[1] <= w[0] * (1.0 + tolerance) + f64::EPSILON)
    }
}

impl From<Vec<f64>> for ErrorHistory {
    fn from(values: Vec<f64>) -> Self {
        ErrorHistory { values }
    }
}
