use anyhow::bail;
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::coding::{ForwardBackward, Lasso, SparseCoder};
use crate::dense::scale_atoms;
use crate::metrics::{reconstruction_error, ErrorHistory};
use crate::update::{Omf, SufficientStatistics};
use crate::utils::{check_signal_dictionary, count_nonzero};

/// Result of an online learning run.
#[derive(Debug, Clone)]
pub struct OnlineReport {
    dictionary: Array2<f64>,
    codes: Array2<f64>,
    errors: ErrorHistory,
    sparsity: Vec<f64>,
    statistics: SufficientStatistics,
}

impl OnlineReport {
    /// Final dictionary, every atom of unit norm.
    pub fn dictionary(&self) -> &Array2<f64> {
        &self.dictionary
    }

    /// Codes of all signals from the last evaluation.
    pub fn codes(&self) -> &Array2<f64> {
        &self.codes
    }

    /// Full-batch error at every evaluation step.
    pub fn errors(&self) -> &ErrorHistory {
        &self.errors
    }

    /// Nonzeros of the Lasso code drawn at every step.
    pub fn sparsity(&self) -> &[f64] {
        &self.sparsity
    }

    pub fn mean_sparsity(&self) -> f64 {
        if self.sparsity.is_empty() {
            return 0.0;
        }
        self.sparsity.iter().sum::<f64>() / self.sparsity.len() as f64
    }

    pub fn statistics(&self) -> &SufficientStatistics {
        &self.statistics
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, ErrorHistory) {
        (self.dictionary, self.codes, self.errors)
    }
}

/// Online dictionary learning (Mairal, Bach, Ponce & Sapiro, 2009).
///
/// Each step draws one signal uniformly at random, codes it with the Lasso,
/// folds it into the sufficient statistics, runs the OMF update and rescales
/// the atoms to unit norm. Every `eval_interval` steps (including step 0) the
/// whole data set is coded with a hard-thresholding Forward-Backward pass,
/// warm-started from the previous evaluation, and the error is recorded.
#[derive(Debug, Clone)]
pub struct OnlineLearner {
    lasso: Lasso,
    omf: Omf,
    evaluator: ForwardBackward,
    n_iter: Option<usize>,
    eval_interval: usize,
    seed: u64,
}

impl OnlineLearner {
    pub fn builder() -> OnlineLearnerBuilder {
        OnlineLearnerBuilder::new()
    }

    /// Number of steps for a data set of `n_samples` signals.
    pub fn n_iter_for(&self, n_samples: usize) -> usize {
        self.n_iter.unwrap_or(10 * n_samples)
    }

    pub fn eval_interval(&self) -> usize {
        self.eval_interval
    }

    pub fn fit(
        &self,
        y: ArrayView2<f64>,
        initial_dictionary: Array2<f64>,
    ) -> anyhow::Result<OnlineReport> {
        check_signal_dictionary(&y, &initial_dictionary.view())?;
        if self.eval_interval == 0 {
            bail!("Evaluation interval must be at least 1");
        }
        let n_samples = y.ncols();
        if n_samples == 0 {
            bail!("Online learning needs at least one signal");
        }

        let n_iter = self.n_iter_for(n_samples);
        let n_atoms = initial_dictionary.ncols();
        let mut dictionary = initial_dictionary;
        let mut statistics = SufficientStatistics::new(y.nrows(), n_atoms);
        let mut eval_codes = Array2::<f64>::zeros((n_atoms, n_samples));
        let mut errors = ErrorHistory::with_capacity(n_iter / self.eval_interval + 1);
        let mut sparsity = Vec::with_capacity(n_iter);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        info!(
            "Online learning: {} signals of size {}, {} atoms, {} steps, lambda = {}",
            n_samples,
            y.nrows(),
            n_atoms,
            n_iter,
            self.lasso.alpha()
        );

        for step in 0..n_iter {
            let index = rng.random_range(0..n_samples);
            let signal = y.column(index);

            let code = self
                .lasso
                .encode(signal.insert_axis(Axis(1)), dictionary.view(), None)?;
            let code = code.column(0);

            statistics.accumulate(signal, code)?;
            self.omf.update(&mut dictionary, &statistics)?;
            scale_atoms(&mut dictionary);

            if step % self.eval_interval == 0 {
                eval_codes = self
                    .evaluator
                    .encode(y, dictionary.view(), Some(eval_codes.view()))?;
                let error = reconstruction_error(y, dictionary.view(), eval_codes.view())?;
                debug!("Step {}: error {:.6e}", step, error);
                errors.push(error);
            }

            sparsity.push(count_nonzero(code) as f64);
        }

        let report = OnlineReport {
            dictionary,
            codes: eval_codes,
            errors,
            sparsity,
            statistics,
        };
        info!(
            "Online learning finished: {} evaluations, mean sparsity {:.3}",
            report.errors.len(),
            report.mean_sparsity()
        );
        Ok(report)
    }
}

/// Builder for [`OnlineLearner`].
///
/// Defaults:
/// - `lambda`: 0.02
/// - `n_iter`: 10 passes over the data
/// - `eval_interval`: 500
/// - `eval_sparsity`: 4
/// - `eval_coding_iters`: 100
/// - `seed`: 0
#[derive(Debug, Clone)]
pub struct OnlineLearnerBuilder {
    lambda: f64,
    n_iter: Option<usize>,
    eval_interval: usize,
    eval_sparsity: usize,
    eval_coding_iters: usize,
    omf_passes: usize,
    seed: u64,
}

impl Default for OnlineLearnerBuilder {
    fn default() -> Self {
        Self {
            lambda: 0.02,
            n_iter: None,
            eval_interval: 500,
            eval_sparsity: 4,
            eval_coding_iters: 100,
            omf_passes: 1,
            seed: 0,
        }
    }
}

impl OnlineLearnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// L1 weight of the per-step Lasso coding.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = Some(n_iter);
        self
    }

    pub fn eval_interval(mut self, eval_interval: usize) -> Self {
        self.eval_interval = eval_interval;
        self
    }

    /// Nonzeros per column kept by the evaluation coder.
    pub fn eval_sparsity(mut self, eval_sparsity: usize) -> Self {
        self.eval_sparsity = eval_sparsity;
        self
    }

    pub fn eval_coding_iters(mut self, eval_coding_iters: usize) -> Self {
        self.eval_coding_iters = eval_coding_iters;
        self
    }

    pub fn omf_passes(mut self, omf_passes: usize) -> Self {
        self.omf_passes = omf_passes;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> OnlineLearner {
        OnlineLearner {
            lasso: Lasso::new(self.lambda),
            omf: Omf::new().passes(self.omf_passes),
            evaluator: ForwardBackward::hard(self.eval_sparsity, self.eval_coding_iters),
            n_iter: self.n_iter,
            eval_interval: self.eval_interval,
            seed: self.seed,
        }
    }
}
