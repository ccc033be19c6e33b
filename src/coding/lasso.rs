use anyhow::bail;
use log::trace;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::{assemble_columns, check_warm_start, soft_threshold, SparseCoder};
use crate::utils::check_signal_dictionary;

/// L1-penalized least squares, `0.5 * ||y - D x||^2 + alpha * ||x||_1`, per column.
///
/// Solved by cyclic coordinate descent on the Gram matrix `D^T D`. No
/// intercept is fitted: signals and dictionary are assumed centred. The
/// number of nonzeros is not controlled directly; it follows from `alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lasso {
    alpha: f64,
    max_iter: usize,
    tol: f64,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Lasso {
            alpha,
            max_iter: 1000,
            tol: 1e-4,
        }
    }

    /// Maximum number of coordinate sweeps per column.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// A column has converged once the largest coefficient change in a sweep is
    /// below `tol` times the largest coefficient.
    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    fn encode_column(
        &self,
        gram: ArrayView2<f64>,
        dty: ArrayView1<f64>,
        warm_start: Option<ArrayView1<f64>>,
    ) -> Array1<f64> {
        let n_atoms = dty.len();
        let mut w = match warm_start {
            Some(w0) => w0.to_owned(),
            None => Array1::zeros(n_atoms),
        };
        let mut gw = gram.dot(&w);

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0f64;
            let mut max_w = 0.0f64;

            for j in 0..n_atoms {
                let g_jj = gram[[j, j]];
                let w_old = w[j];
                let w_new = if g_jj > 0.0 {
                    let rho = dty[j] - gw[j] + g_jj * w_old;
                    soft_threshold(rho, self.alpha) / g_jj
                } else {
                    // zero atom
                    0.0
                };

                if w_new != w_old {
                    gw.scaled_add(w_new - w_old, &gram.column(j));
                    w[j] = w_new;
                }
                max_delta = max_delta.max((w_new - w_old).abs());
                max_w = max_w.max(w_new.abs());
            }

            if max_w == 0.0 || max_delta <= self.tol * max_w {
                break;
            }
        }

        w
    }
}

impl SparseCoder for Lasso {
    fn encode(
        &self,
        y: ArrayView2<f64>,
        dictionary: ArrayView2<f64>,
        warm_start: Option<ArrayView2<f64>>,
    ) -> anyhow::Result<Array2<f64>> {
        check_signal_dictionary(&y, &dictionary)?;
        check_warm_start(&y, &dictionary, &warm_start)?;
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            bail!("Lasso penalty must be finite and non-negative, got {}", self.alpha);
        }
        let n_atoms = dictionary.ncols();

        let gram = dictionary.t().dot(&dictionary);
        let dty = dictionary.t().dot(&y);

        trace!(
            "Lasso: coding {} samples over {} atoms, alpha = {}",
            y.ncols(),
            n_atoms,
            self.alpha
        );

        let columns: Vec<Array1<f64>> = (0..y.ncols())
            .into_par_iter()
            .map(|j| {
                let warm = warm_start.as_ref().map(|x0| x0.column(j));
                self.encode_column(gram.view(), dty.column(j), warm)
            })
            .collect();

        assemble_columns(n_atoms, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{mean_sparsity, reconstruction_error};
    use crate::synthetic::make_sparse_coded_signal;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // largest penalty for which some coefficient is still nonzero
    fn alpha_max(y: ArrayView2<f64>, dictionary: ArrayView2<f64>) -> f64 {
        dictionary
            .t()
            .dot(&y)
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn test_lasso_orthonormal_is_soft_threshold() {
        let d = Array2::<f64>::eye(3);
        let y = array![[2.0], [-0.5], [1.5]];
        let x = Lasso::new(1.0).encode(y.view(), d.view(), None).unwrap();

        assert_abs_diff_eq!(x[[0, 0]], 1.0, epsilon = 1e-12);
        assert_eq!(x[[1, 0]], 0.0);
        assert_abs_diff_eq!(x[[2, 0]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_lasso_zero_penalty_is_least_squares() {
        let d = array![[1.0, 0.5], [0.0, 1.0], [0.0, 0.0]];
        let y = array![[2.0], [1.0], [0.0]];
        let x = Lasso::new(0.0)
            .tol(1e-12)
            .max_iter(10_000)
            .encode(y.view(), d.view(), None)
            .unwrap();

        // y lies in the span of d: exact fit x = (1.5, 1.0)
        assert_abs_diff_eq!(x[[0, 0]], 1.5, epsilon = 1e-8);
        assert_abs_diff_eq!(x[[1, 0]], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_lasso_large_penalty_gives_zero() {
        let signal = make_sparse_coded_signal(20, 15, 10, 3, 1).unwrap();
        let alpha = alpha_max(signal.y().view(), signal.dictionary().view());
        let x = Lasso::new(alpha * 1.01)
            .encode(signal.y().view(), signal.dictionary().view(), None)
            .unwrap();

        assert!(x.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_lasso_sparsity_grows_as_penalty_shrinks() {
        let signal = make_sparse_coded_signal(40, 30, 20, 3, 2).unwrap();
        let y = signal.y().view();
        let d = signal.dictionary().view();

        let sparse = Lasso::new(0.5).encode(y, d, None).unwrap();
        let dense = Lasso::new(0.01).encode(y, d, None).unwrap();

        assert!(mean_sparsity(sparse.view()) <= mean_sparsity(dense.view()));
        assert!(
            reconstruction_error(y, d, dense.view()).unwrap()
                <= reconstruction_error(y, d, sparse.view()).unwrap()
        );
    }

    #[test]
    fn test_lasso_warm_start_shape_checked() {
        let y = Array2::<f64>::zeros((3, 4));
        let d = Array2::<f64>::eye(3);
        let bad = Array2::<f64>::zeros((3, 5));
        assert!(Lasso::new(0.1)
            .encode(y.view(), d.view(), Some(bad.view()))
            .is_err());
    }

    #[test]
    fn test_lasso_negative_penalty() {
        let y = Array2::<f64>::zeros((3, 1));
        let d = Array2::<f64>::eye(3);
        assert!(Lasso::new(-1.0).encode(y.view(), d.view(), None).is_err());
    }
}
