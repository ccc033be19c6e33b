use std::time::{Duration, Instant};

use anyhow::bail;
use log::{debug, info};
use ndarray::{Array2, ArrayView2};

use crate::coding::{ForwardBackward, Omp, SparseCoder};
use crate::metrics::{mean_sparsity, reconstruction_error, ErrorHistory};
use crate::update::{DictionaryUpdater, ForwardBackwardUpdate, Ksvd};
use crate::utils::check_signal_dictionary;

/// Iterations of the Forward-Backward coder in the Forward-Backward preset.
const FB_CODING_ITERS: usize = 100;
/// Iterations of the Forward-Backward dictionary update in the Forward-Backward preset.
const FB_UPDATE_ITERS: usize = 50;
/// log10 of the error under which the K-SVD preset stops.
const KSVD_EARLY_STOP_LOG10: f64 = 2.0;

/// Result of a batch learning run.
///
/// `errors` holds two values per completed iteration: the error after the
/// coding half-step followed by the error after the update half-step.
#[derive(Debug, Clone)]
pub struct LearningReport {
    dictionary: Array2<f64>,
    codes: Array2<f64>,
    errors: ErrorHistory,
    coding_times: Vec<Duration>,
    update_times: Vec<Duration>,
    stopped_early: bool,
}

impl LearningReport {
    pub fn dictionary(&self) -> &Array2<f64> {
        &self.dictionary
    }

    pub fn codes(&self) -> &Array2<f64> {
        &self.codes
    }

    pub fn errors(&self) -> &ErrorHistory {
        &self.errors
    }

    /// Wall-clock time of every coding half-step.
    pub fn coding_times(&self) -> &[Duration] {
        &self.coding_times
    }

    /// Wall-clock time of every update half-step.
    pub fn update_times(&self) -> &[Duration] {
        &self.update_times
    }

    /// Number of completed (coding, update) iterations.
    pub fn n_iter_run(&self) -> usize {
        self.update_times.len()
    }

    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    /// Mean number of nonzeros per column of the final codes.
    pub fn mean_sparsity(&self) -> f64 {
        mean_sparsity(self.codes.view())
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, ErrorHistory) {
        (self.dictionary, self.codes, self.errors)
    }
}

/// Batch dictionary learner alternating a sparse coder `C` and a dictionary updater `U`.
#[derive(Debug, Clone)]
pub struct BatchLearner<C, U>
where
    C: SparseCoder,
    U: DictionaryUpdater,
{
    coder: C,
    updater: U,
    n_iter: usize,
    early_stop_log10: Option<f64>,
}

impl BatchLearner<Omp, Ksvd> {
    /// OMP with `k` nonzeros and K-SVD, stopping once `log10(error) < 2` after an update.
    pub fn ksvd(k: usize, n_iter: usize) -> Self {
        BatchLearnerBuilder::new(Omp::new(k), Ksvd::new())
            .n_iter(n_iter)
            .early_stop_log10(KSVD_EARLY_STOP_LOG10)
            .build()
    }
}

impl BatchLearner<ForwardBackward, ForwardBackwardUpdate> {
    /// Forward-Backward coding with `k` nonzeros and the Forward-Backward
    /// dictionary update, run for exactly `n_iter` iterations.
    pub fn forward_backward(k: usize, n_iter: usize) -> Self {
        BatchLearnerBuilder::new(
            ForwardBackward::hard(k, FB_CODING_ITERS),
            ForwardBackwardUpdate::new(FB_UPDATE_ITERS),
        )
        .n_iter(n_iter)
        .build()
    }
}

impl<C, U> BatchLearner<C, U>
where
    C: SparseCoder,
    U: DictionaryUpdater,
{
    pub fn coder(&self) -> &C {
        &self.coder
    }

    pub fn updater(&self) -> &U {
        &self.updater
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Learns a dictionary for `y` starting from `initial_dictionary`.
    ///
    /// Codes start at zero and every coding half-step is warm-started from the
    /// previous codes.
    pub fn fit(
        &self,
        y: ArrayView2<f64>,
        initial_dictionary: Array2<f64>,
    ) -> anyhow::Result<LearningReport> {
        check_signal_dictionary(&y, &initial_dictionary.view())?;
        if let Some(threshold) = self.early_stop_log10 {
            if threshold.is_nan() {
                bail!("Early stopping threshold must not be NaN");
            }
        }

        let n_atoms = initial_dictionary.ncols();
        let mut dictionary = initial_dictionary;
        let mut codes = Array2::<f64>::zeros((n_atoms, y.ncols()));
        let mut errors = ErrorHistory::with_capacity(2 * self.n_iter);
        let mut coding_times = Vec::with_capacity(self.n_iter);
        let mut update_times = Vec::with_capacity(self.n_iter);
        let mut stopped_early = false;

        info!(
            "Batch learning: {} signals of size {}, {} atoms, up to {} iterations",
            y.ncols(),
            y.nrows(),
            n_atoms,
            self.n_iter
        );

        for iteration in 0..self.n_iter {
            let tic = Instant::now();
            codes = self
                .coder
                .encode(y, dictionary.view(), Some(codes.view()))?;
            coding_times.push(tic.elapsed());
            let coding_error = reconstruction_error(y, dictionary.view(), codes.view())?;
            errors.push(coding_error);

            let tic = Instant::now();
            self.updater.update(y, &mut dictionary, &mut codes)?;
            update_times.push(tic.elapsed());
            let update_error = reconstruction_error(y, dictionary.view(), codes.view())?;
            errors.push(update_error);

            debug!(
                "Iteration {}: error after coding {:.6e}, after update {:.6e}",
                iteration, coding_error, update_error
            );

            if let Some(threshold) = self.early_stop_log10 {
                if update_error.log10() < threshold {
                    info!(
                        "Stopping after iteration {}: log10(error) = {:.4} < {}",
                        iteration,
                        update_error.log10(),
                        threshold
                    );
                    stopped_early = true;
                    break;
                }
            }
        }

        info!(
            "Batch learning finished after {} iterations, final error {:.6e}",
            update_times.len(),
            errors.last().unwrap_or(f64::NAN)
        );

        Ok(LearningReport {
            dictionary,
            codes,
            errors,
            coding_times,
            update_times,
            stopped_early,
        })
    }
}

/// Builder for [`BatchLearner`] around any coder and updater.
///
/// Defaults: 100 iterations, no early stopping.
///
/// ```ignore
/// let learner = BatchLearnerBuilder::new(Omp::new(4), Ksvd::new())
///     .n_iter(50)
///     .early_stop_log10(1.0)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct BatchLearnerBuilder<C, U>
where
    C: SparseCoder,
    U: DictionaryUpdater,
{
    coder: C,
    updater: U,
    n_iter: usize,
    early_stop_log10: Option<f64>,
}

impl<C, U> BatchLearnerBuilder<C, U>
where
    C: SparseCoder,
    U: DictionaryUpdater,
{
    pub fn new(coder: C, updater: U) -> Self {
        Self {
            coder,
            updater,
            n_iter: 100,
            early_stop_log10: None,
        }
    }

    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Stops once `log10(error)` after an update half-step drops below `threshold`.
    pub fn early_stop_log10(mut self, threshold: f64) -> Self {
        self.early_stop_log10 = Some(threshold);
        self
    }

    pub fn no_early_stop(mut self) -> Self {
        self.early_stop_log10 = None;
        self
    }

    pub fn build(self) -> BatchLearner<C, U> {
        BatchLearner {
            coder: self.coder,
            updater: self.updater,
            n_iter: self.n_iter,
            early_stop_log10: self.early_stop_log10,
        }
    }
}
