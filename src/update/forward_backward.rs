use anyhow::bail;
use log::trace;
use ndarray::{Array2, ArrayView2};

use super::DictionaryUpdater;
use crate::dense::Normalize;
use crate::svd::squared_spectral_norm;
use crate::utils::{check_codes, Direction};

/// Projected gradient dictionary update.
///
/// Mirrors [`crate::coding::ForwardBackward`] with the roles of `D` and `X`
/// swapped: `D <- proj(D - step * (D X - Y) Xᵀ)` where the projection rescales
/// every atom to unit norm. The step is `step_factor / L`, `L` the largest
/// eigenvalue of `X Xᵀ`. Runs exactly `n_iter` iterations; codes are not modified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardBackwardUpdate {
    n_iter: usize,
    step_factor: f64,
}

impl ForwardBackwardUpdate {
    pub fn new(n_iter: usize) -> Self {
        ForwardBackwardUpdate {
            n_iter,
            step_factor: 1.0,
        }
    }

    /// Step size as a fraction of `1 / L`, must lie in `(0, 1]`.
    pub fn step_factor(mut self, step_factor: f64) -> Self {
        self.step_factor = step_factor;
        self
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl DictionaryUpdater for ForwardBackwardUpdate {
    fn update(
        &self,
        y: ArrayView2<f64>,
        dictionary: &mut Array2<f64>,
        codes: &mut Array2<f64>,
    ) -> anyhow::Result<()> {
        check_codes(&y, &dictionary.view(), &codes.view())?;
        if !(self.step_factor > 0.0 && self.step_factor <= 1.0) {
            bail!("Step factor must lie in (0, 1], got {}", self.step_factor);
        }

        let lipschitz = squared_spectral_norm(codes.view())?;
        let step = if lipschitz > 0.0 {
            self.step_factor / lipschitz
        } else {
            0.0
        };
        trace!(
            "Forward-backward update: L = {:.4e}, step = {:.4e}, {} iterations",
            lipschitz,
            step,
            self.n_iter
        );

        let yxt = y.dot(&codes.t());
        let xxt = codes.dot(&codes.t());

        for _ in 0..self.n_iter {
            let gradient = dictionary.dot(&xxt) - &yxt;
            dictionary.scaled_add(-step, &gradient);
            dictionary.normalize(&Direction::COLUMN);
        }

        Ok(())
    }
}
