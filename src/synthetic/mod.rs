//! Synthetic sparse signals and random initial dictionaries.
//!
//! All generators are seeded with a `ChaCha8Rng`, so the same seed gives the
//! same matrices on every platform.

use anyhow::bail;
use ndarray::{Array2, ArrayView2, Axis};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::dense::Normalize;
use crate::utils::Direction;

/// Signals generated from a known dictionary and known sparse codes, `Y = D X`.
#[derive(Debug, Clone)]
pub struct SparseCodedSignal {
    y: Array2<f64>,
    dictionary: Array2<f64>,
    codes: Array2<f64>,
}

impl SparseCodedSignal {
    /// Signals, (signal_size × n_samples).
    pub fn y(&self) -> &Array2<f64> {
        &self.y
    }

    /// Generating dictionary, (signal_size × n_atoms) with unit-norm atoms.
    pub fn dictionary(&self) -> &Array2<f64> {
        &self.dictionary
    }

    /// Generating codes, (n_atoms × n_samples) with exactly `n_nonzero` nonzeros per column.
    pub fn codes(&self) -> &Array2<f64> {
        &self.codes
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        (self.y, self.dictionary, self.codes)
    }
}

/// Generates `Y = D X` with a Gaussian dictionary `D` (unit-norm atoms) and
/// codes `X` holding `n_nonzero` standard normal values per column at
/// uniformly drawn rows.
pub fn make_sparse_coded_signal(
    n_samples: usize,
    n_atoms: usize,
    signal_size: usize,
    n_nonzero: usize,
    seed: u64,
) -> anyhow::Result<SparseCodedSignal> {
    if n_nonzero > n_atoms {
        bail!(
            "Number of nonzero coefficients ({}) exceeds number of atoms ({})",
            n_nonzero,
            n_atoms
        );
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut dictionary =
        Array2::from_shape_fn((signal_size, n_atoms), |_| rng.sample::<f64, _>(StandardNormal));
    dictionary.normalize(&Direction::COLUMN);

    let mut codes = Array2::zeros((n_atoms, n_samples));
    for mut column in codes.axis_iter_mut(Axis(1)) {
        for row in sample(&mut rng, n_atoms, n_nonzero) {
            column[row] = rng.sample::<f64, _>(StandardNormal);
        }
    }

    let y = dictionary.dot(&codes);
    Ok(SparseCodedSignal {
        y,
        dictionary,
        codes,
    })
}

/// Dictionary with entries drawn uniformly from `[0, 1)`; atoms are not normalized.
pub fn random_dictionary(signal_size: usize, n_atoms: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((signal_size, n_atoms), |_| rng.random::<f64>())
}

/// Dictionary made of the first `n_atoms` nonzero signals of `y`, scaled to unit norm.
pub fn sample_dictionary(y: ArrayView2<f64>, n_atoms: usize) -> anyhow::Result<Array2<f64>> {
    let columns: Vec<usize> = y
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, signal)| signal.iter().any(|&v| v != 0.0))
        .map(|(i, _)| i)
        .take(n_atoms)
        .collect();
    if columns.len() < n_atoms {
        bail!(
            "Only {} nonzero signals available for a dictionary of {} atoms",
            columns.len(),
            n_atoms
        );
    }

    let mut dictionary = y.select(Axis(1), &columns);
    dictionary.normalize(&Direction::COLUMN);
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::nonzero_per_column;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_make_sparse_coded_signal_shapes() {
        let signal = make_sparse_coded_signal(40, 10, 8, 3, 0).unwrap();

        assert_eq!(signal.y().dim(), (8, 40));
        assert_eq!(signal.dictionary().dim(), (8, 10));
        assert_eq!(signal.codes().dim(), (10, 40));
        assert!(nonzero_per_column(signal.codes().view())
            .iter()
            .all(|&n| n == 3));
        for atom in signal.dictionary().axis_iter(Axis(1)) {
            assert_abs_diff_eq!(atom.dot(&atom), 1.0, epsilon = 1e-12);
        }

        let expected = signal.dictionary().dot(signal.codes());
        assert_eq!(signal.y(), &expected);
    }

    #[test]
    fn test_make_sparse_coded_signal_is_seeded() {
        let a = make_sparse_coded_signal(5, 6, 4, 2, 42).unwrap();
        let b = make_sparse_coded_signal(5, 6, 4, 2, 42).unwrap();
        let c = make_sparse_coded_signal(5, 6, 4, 2, 43).unwrap();

        assert_eq!(a.y(), b.y());
        assert_ne!(a.y(), c.y());
    }

    #[test]
    fn test_make_sparse_coded_signal_too_sparse() {
        assert!(make_sparse_coded_signal(5, 3, 4, 4, 0).is_err());
    }

    #[test]
    fn test_sample_dictionary_skips_zero_signals() {
        let y = ndarray::array![[0.0, 3.0, 0.0, 1.0], [0.0, 4.0, 0.0, 0.0]];

        let d = sample_dictionary(y.view(), 2).unwrap();

        assert_eq!(d.dim(), (2, 2));
        assert_abs_diff_eq!(d[[0, 0]], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(d[[1, 0]], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(d[[0, 1]], 1.0, epsilon = 1e-12);
        assert!(sample_dictionary(y.view(), 3).is_err());
    }

    #[test]
    fn test_random_dictionary() {
        let d = random_dictionary(5, 7, 0);
        assert_eq!(d.dim(), (5, 7));
        assert!(d.iter().all(|&v| (0.0..1.0).contains(&v)));
        assert_eq!(d, random_dictionary(5, 7, 0));
    }
}
