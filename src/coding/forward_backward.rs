use anyhow::bail;
use log::trace;
use ndarray::{Array2, ArrayView2, ArrayViewMut1, Axis};

use super::{check_warm_start, soft_threshold, SparseCoder};
use crate::svd::squared_spectral_norm;
use crate::utils::check_signal_dictionary;

/// Constraint enforced by the proximal (backward) step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    /// Keep the `k` largest-magnitude entries of every column (hard thresholding).
    Hard(usize),
    /// L1 penalty with weight `lambda` (soft thresholding at `step * lambda`).
    L1(f64),
}

impl Penalty {
    fn validate(&self) -> anyhow::Result<()> {
        if let Penalty::L1(lambda) = self {
            if !lambda.is_finite() || *lambda < 0.0 {
                bail!("L1 penalty must be finite and non-negative, got {}", lambda);
            }
        }
        Ok(())
    }

    fn apply(&self, codes: &mut Array2<f64>, step: f64) {
        match *self {
            Penalty::Hard(k) => {
                for column in codes.axis_iter_mut(Axis(1)) {
                    keep_largest(column, k);
                }
            }
            Penalty::L1(lambda) => {
                let threshold = step * lambda;
                codes.mapv_inplace(|v| soft_threshold(v, threshold));
            }
        }
    }
}

/// Zeroes everything but the `k` largest-magnitude entries.
pub(crate) fn keep_largest(mut column: ArrayViewMut1<f64>, k: usize) {
    let nonzero = column.iter().filter(|&&v| v != 0.0).count();
    if nonzero <= k {
        return;
    }
    if k == 0 {
        column.fill(0.0);
        return;
    }

    let mut order: Vec<usize> = (0..column.len()).collect();
    order.select_nth_unstable_by(k - 1, |&a, &b| column[b].abs().total_cmp(&column[a].abs()));
    for &i in &order[k..] {
        column[i] = 0.0;
    }
}

/// Forward-backward (proximal gradient) sparse coding.
///
/// Each iteration takes a gradient step on `0.5 * ||Y - D X||^2`,
/// `X <- X - step * D^T (D X - Y)`, followed by the proximal step of the
/// [`Penalty`]. The step is `step_factor / L` with `L` the largest eigenvalue
/// of `D^T D`; a step above `1 / L` makes the iteration diverge. The loop
/// always runs `n_iter` iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardBackward {
    penalty: Penalty,
    n_iter: usize,
    step_factor: f64,
}

impl ForwardBackward {
    pub fn new(penalty: Penalty, n_iter: usize) -> Self {
        ForwardBackward {
            penalty,
            n_iter,
            step_factor: 1.0,
        }
    }

    /// Sparsity-constrained coder keeping `k` nonzeros per column.
    pub fn hard(k: usize, n_iter: usize) -> Self {
        Self::new(Penalty::Hard(k), n_iter)
    }

    /// Step size as a fraction of `1 / L`, must lie in `(0, 1]`.
    pub fn step_factor(mut self, step_factor: f64) -> Self {
        self.step_factor = step_factor;
        self
    }

    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl SparseCoder for ForwardBackward {
    fn encode(
        &self,
        y: ArrayView2<f64>,
        dictionary: ArrayView2<f64>,
        warm_start: Option<ArrayView2<f64>>,
    ) -> anyhow::Result<Array2<f64>> {
        check_signal_dictionary(&y, &dictionary)?;
        check_warm_start(&y, &dictionary, &warm_start)?;
        self.penalty.validate()?;
        if !(self.step_factor > 0.0 && self.step_factor <= 1.0) {
            bail!("Step factor must lie in (0, 1], got {}", self.step_factor);
        }

        let mut codes = match warm_start {
            Some(x0) => x0.to_owned(),
            None => Array2::zeros((dictionary.ncols(), y.ncols())),
        };

        let lipschitz = squared_spectral_norm(dictionary)?;
        // an all-zero dictionary has a vanishing gradient
        let step = if lipschitz > 0.0 {
            self.step_factor / lipschitz
        } else {
            0.0
        };
        trace!(
            "Forward-backward coding: L = {:.4e}, step = {:.4e}, {} iterations",
            lipschitz,
            step,
            self.n_iter
        );

        let gram = dictionary.t().dot(&dictionary);
        let dty = dictionary.t().dot(&y);

        for _ in 0..self.n_iter {
            let gradient = gram.dot(&codes) - &dty;
            codes.scaled_add(-step, &gradient);
            self.penalty.apply(&mut codes, step);
        }

        Ok(codes)
    }
}
