use log::trace;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use super::{assemble_columns, SparseCoder};
use crate::svd::solve_symmetric;
use crate::utils::check_signal_dictionary;

/// Orthogonal Matching Pursuit with a fixed number of nonzero coefficients.
///
/// Works in Gram form: correlations are tracked as `D^T y - G[:, S] x_S` and the
/// least-squares problem on the support `S` is solved from `G[S, S]`, so the
/// residual vector itself is never formed. No intercept is fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Omp {
    n_nonzero: usize,
}

impl Omp {
    pub fn new(n_nonzero: usize) -> Self {
        Omp { n_nonzero }
    }

    pub fn n_nonzero(&self) -> usize {
        self.n_nonzero
    }

    fn encode_column(
        &self,
        gram: ArrayView2<f64>,
        dty: ArrayView1<f64>,
    ) -> anyhow::Result<Array1<f64>> {
        let n_atoms = dty.len();
        let n_nonzero = self.n_nonzero.min(n_atoms);
        let mut code = Array1::zeros(n_atoms);

        // correlations below this are round-off of an exhausted residual
        let scale = dty.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let threshold = f64::EPSILON * scale;

        let mut support: Vec<usize> = Vec::with_capacity(n_nonzero);
        let mut in_support = vec![false; n_atoms];
        let mut solution = DVector::<f64>::zeros(0);
        let mut correlations = dty.to_owned();

        for _ in 0..n_nonzero {
            let mut best: Option<(usize, f64)> = None;
            for (j, &c) in correlations.iter().enumerate() {
                if in_support[j] {
                    continue;
                }
                let magnitude = c.abs();
                if magnitude > threshold && best.map_or(true, |(_, b)| magnitude > b) {
                    best = Some((j, magnitude));
                }
            }
            let Some((atom, _)) = best else {
                break;
            };

            support.push(atom);
            in_support[atom] = true;

            let s = support.len();
            let gram_ss = DMatrix::from_fn(s, s, |a, b| gram[[support[a], support[b]]]);
            let rhs = DVector::from_iterator(s, support.iter().map(|&i| dty[i]));
            solution = solve_symmetric(gram_ss, &rhs)?;

            correlations.assign(&dty);
            for (a, &i) in support.iter().enumerate() {
                correlations.scaled_add(-solution[a], &gram.column(i));
            }
        }

        for (a, &i) in support.iter().enumerate() {
            code[i] = solution[a];
        }
        Ok(code)
    }
}

impl SparseCoder for Omp {
    fn encode(
        &self,
        y: ArrayView2<f64>,
        dictionary: ArrayView2<f64>,
        _warm_start: Option<ArrayView2<f64>>,
    ) -> anyhow::Result<Array2<f64>> {
        check_signal_dictionary(&y, &dictionary)?;
        let n_atoms = dictionary.ncols();

        let gram = dictionary.t().dot(&dictionary);
        let dty = dictionary.t().dot(&y);

        trace!(
            "OMP: coding {} samples over {} atoms, k = {}",
            y.ncols(),
            n_atoms,
            self.n_nonzero
        );

        let columns = dty
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(|column| self.encode_column(gram.view(), column))
            .collect::<anyhow::Result<Vec<_>>>()?;

        assemble_columns(n_atoms, columns)
    }
}
