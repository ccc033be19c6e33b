//! Small dense linear-algebra kernels backed by nalgebra.
//!
//! The learning code works on `ndarray` matrices; the decompositions it needs
//! (a leading singular triplet, the top eigenvalue of a Gram matrix and small
//! symmetric solves) are delegated to nalgebra through `nshare`.

use anyhow::{anyhow, bail};
use nalgebra::linalg::{SymmetricEigen, SVD};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView2};
use nshare::IntoNalgebra;

/// Leading singular triplet `(u, s, v)` of a matrix, i.e. its best rank-1 approximation `s * u * v^T`.
pub struct Rank1 {
    u: Array1<f64>,
    s: f64,
    v: Array1<f64>,
}

impl Rank1 {
    pub fn compute(matrix: ArrayView2<f64>) -> anyhow::Result<Self> {
        let (m, n) = matrix.dim();
        if m == 0 || n == 0 {
            bail!("Cannot compute the SVD of an empty {}x{} matrix", m, n);
        }

        let matrix = matrix.into_nalgebra().clone_owned();
        let svd = SVD::try_new(matrix, true, true, f64::EPSILON, 0)
            .ok_or_else(|| anyhow!("SVD computation did not converge"))?;

        let u = svd
            .u
            .as_ref()
            .ok_or_else(|| anyhow!("SVD did not compute left singular vectors"))?;
        let v_t = svd
            .v_t
            .as_ref()
            .ok_or_else(|| anyhow!("SVD did not compute right singular vectors"))?;

        // nalgebra does not guarantee ordering of the singular values
        let (idx, s) = svd
            .singular_values
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, s)| {
                if s > best.1 {
                    (i, s)
                } else {
                    best
                }
            });

        Ok(Rank1 {
            u: Array1::from_iter(u.column(idx).iter().copied()),
            s,
            v: Array1::from_iter(v_t.row(idx).iter().copied()),
        })
    }

    pub fn u(&self) -> &Array1<f64> {
        &self.u
    }

    pub fn s(&self) -> f64 {
        self.s
    }

    pub fn v(&self) -> &Array1<f64> {
        &self.v
    }
}

/// Largest eigenvalue of `A^T A` (equivalently the squared spectral norm of `A`).
///
/// This is the Lipschitz constant of the gradient of `0.5 * ||Y - A X||^2` with
/// respect to `X`. The smaller of the two Gram matrices is decomposed.
pub fn squared_spectral_norm(a: ArrayView2<f64>) -> anyhow::Result<f64> {
    let (m, n) = a.dim();
    if m == 0 || n == 0 {
        return Ok(0.0);
    }

    let gram = if m <= n { a.dot(&a.t()) } else { a.t().dot(&a) };
    let gram: DMatrix<f64> = gram.view().into_nalgebra().clone_owned();
    let eigen = SymmetricEigen::try_new(gram, f64::EPSILON, 0)
        .ok_or_else(|| anyhow!("Symmetric eigendecomposition did not converge"))?;

    Ok(eigen.eigenvalues.max().max(0.0))
}

/// Solves `G z = b` for a small symmetric positive semi-definite `G`.
///
/// Uses a Cholesky factorization and falls back to an SVD least-squares solve
/// when `G` is singular (e.g. duplicated atoms).
pub fn solve_symmetric(gram: DMatrix<f64>, rhs: &DVector<f64>) -> anyhow::Result<DVector<f64>> {
    if gram.nrows() != rhs.len() || gram.ncols() != rhs.len() {
        bail!(
            "System of size {}x{} does not match right-hand side of length {}",
            gram.nrows(),
            gram.ncols(),
            rhs.len()
        );
    }

    if let Some(chol) = gram.clone().cholesky() {
        let z = chol.solve(rhs);
        // a zero pivot slips through the factorization and shows up here
        if z.iter().all(|v| v.is_finite()) {
            return Ok(z);
        }
    }

    let svd = SVD::try_new(gram, true, true, f64::EPSILON, 0)
        .ok_or_else(|| anyhow!("SVD computation did not converge"))?;
    svd.solve(rhs, 1e-12)
        .map_err(|e| anyhow!("Least-squares solve failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_rank1_of_rank1_matrix() {
        let u = array![1.0, 2.0, 2.0] / 3.0;
        let v = array![0.6, 0.8];
        let a: Array2<f64> = u
            .insert_axis(ndarray::Axis(1))
            .dot(&v.insert_axis(ndarray::Axis(0)))
            * 5.0;

        let rank1 = Rank1::compute(a.view()).unwrap();
        assert_abs_diff_eq!(rank1.s(), 5.0, epsilon = 1e-10);
        assert_abs_diff_eq!(rank1.u().dot(rank1.u()), 1.0, epsilon = 1e-10);

        // sign ambiguity: compare the reconstruction instead of the vectors
        for i in 0..3 {
            for j in 0..2 {
                let r = rank1.s() * rank1.u()[i] * rank1.v()[j];
                assert_abs_diff_eq!(r, a[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_rank1_picks_largest_singular_value() {
        let a = array![[1.0, 0.0], [0.0, 3.0]];
        let rank1 = Rank1::compute(a.view()).unwrap();
        assert_abs_diff_eq!(rank1.s(), 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(rank1.u()[1].abs(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rank1_empty_matrix() {
        let a = Array2::<f64>::zeros((3, 0));
        assert!(Rank1::compute(a.view()).is_err());
    }

    #[test]
    fn test_squared_spectral_norm() {
        let a = array![[2.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert_abs_diff_eq!(squared_spectral_norm(a.view()).unwrap(), 4.0, epsilon = 1e-10);
        assert_abs_diff_eq!(
            squared_spectral_norm(a.t()).unwrap(),
            4.0,
            epsilon = 1e-10
        );

        let zero = Array2::<f64>::zeros((2, 2));
        assert_abs_diff_eq!(squared_spectral_norm(zero.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_solve_symmetric() {
        let g = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let z = solve_symmetric(g.clone(), &b).unwrap();
        let r = g * &z - b;
        assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_symmetric_singular_falls_back() {
        // duplicated atom: the Gram matrix is singular
        let g = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0, 2.0]);
        let z = solve_symmetric(g.clone(), &b).unwrap();
        let r = g * &z - b;
        assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-10);
    }
}
