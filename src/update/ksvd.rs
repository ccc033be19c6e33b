use log::{debug, trace};
use ndarray::{Array2, ArrayView2, Axis};

use super::DictionaryUpdater;
use crate::svd::Rank1;
use crate::utils::check_codes;

/// K-SVD dictionary update (Aharon, Elad & Bruckstein, 2006).
///
/// Atoms are visited in order. For atom `j`, the samples whose code uses `j`
/// are collected, the residual of those samples without atom `j` is formed,
/// and its leading singular pair replaces the atom (unit norm) and the nonzero
/// values of row `j` of the codes. The support of the codes is never changed.
///
/// The atom loop is sequential: the residual seen by atom `j + 1` includes the
/// update of atom `j`.
///
/// Atoms used by no sample are replaced by the normalized residual of the
/// worst-represented signal that has not yet been used for a replacement in
/// this call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ksvd {
    reinitialize_unused: bool,
}

impl Default for Ksvd {
    fn default() -> Self {
        Ksvd {
            reinitialize_unused: true,
        }
    }
}

impl Ksvd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether unused atoms are replaced (default) or left as they are.
    pub fn reinitialize_unused(mut self, reinitialize_unused: bool) -> Self {
        self.reinitialize_unused = reinitialize_unused;
        self
    }

    fn reinitialize_atom(
        atom: usize,
        dictionary: &mut Array2<f64>,
        residual: &Array2<f64>,
        taken: &mut [bool],
    ) {
        let worst = residual
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(i, _)| !taken[*i])
            .map(|(i, r)| (i, r.dot(&r)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match worst {
            Some((sample, energy)) if energy > 0.0 => {
                taken[sample] = true;
                let replacement = residual.column(sample).mapv(|v| v / energy.sqrt());
                dictionary.column_mut(atom).assign(&replacement);
                debug!(
                    "K-SVD: atom {} unused, reinitialized from sample {} (residual energy {:.4e})",
                    atom, sample, energy
                );
            }
            _ => {
                debug!("K-SVD: atom {} unused and no residual left to reinitialize from", atom);
            }
        }
    }
}

impl DictionaryUpdater for Ksvd {
    fn update(
        &self,
        y: ArrayView2<f64>,
        dictionary: &mut Array2<f64>,
        codes: &mut Array2<f64>,
    ) -> anyhow::Result<()> {
        check_codes(&y, &dictionary.view(), &codes.view())?;
        let n_atoms = dictionary.ncols();
        let n_samples = y.ncols();

        let mut residual = &y - &dictionary.dot(&*codes);
        let mut taken = vec![false; n_samples];

        for atom in 0..n_atoms {
            let users: Vec<usize> = codes
                .row(atom)
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(|(i, _)| i)
                .collect();

            if users.is_empty() {
                if self.reinitialize_unused {
                    Self::reinitialize_atom(atom, dictionary, &residual, &mut taken);
                }
                continue;
            }

            // residual of the users with this atom's contribution added back
            let d_j = dictionary.column(atom).to_owned();
            let mut restricted = residual.select(Axis(1), &users);
            for (c, &i) in users.iter().enumerate() {
                restricted.column_mut(c).scaled_add(codes[[atom, i]], &d_j);
            }

            let rank1 = Rank1::compute(restricted.view())?;
            if rank1.s() <= 0.0 {
                // the atom already explains its users exactly
                continue;
            }

            // an exact zero in v would drop the sample from the support; it keeps
            // its previous coefficient, oriented along the new atom
            let orientation = if rank1.u().dot(&d_j) < 0.0 { -1.0 } else { 1.0 };

            dictionary.column_mut(atom).assign(rank1.u());
            for (c, &i) in users.iter().enumerate() {
                let value = match rank1.v()[c] {
                    v if v != 0.0 => rank1.s() * v,
                    _ => orientation * codes[[atom, i]],
                };
                codes[[atom, i]] = value;

                let mut r = residual.column_mut(i);
                r.assign(&restricted.column(c));
                r.scaled_add(-value, rank1.u());
            }

            trace!(
                "K-SVD: atom {} updated from {} samples, sigma = {:.4e}",
                atom,
                users.len(),
                rank1.s()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::{Omp, SparseCoder};
    use crate::metrics::reconstruction_error;
    use crate::synthetic::{make_sparse_coded_signal, random_dictionary};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_ksvd_unit_atoms_and_fixed_support() {
        let signal = make_sparse_coded_signal(200, 30, 16, 3, 0).unwrap();
        let mut d = random_dictionary(16, 30, 1);
        let mut x = Omp::new(3).encode(signal.y().view(), d.view(), None).unwrap();
        let support_before = x.mapv(|v| v != 0.0);

        Ksvd::new()
            .update(signal.y().view(), &mut d, &mut x)
            .unwrap();

        assert_eq!(d.dim(), (16, 30));
        assert_eq!(x.dim(), (30, 200));
        assert_eq!(x.mapv(|v| v != 0.0), support_before);
        for (j, atom) in d.axis_iter(Axis(1)).enumerate() {
            if support_before.row(j).iter().any(|&used| used) {
                assert_abs_diff_eq!(atom.dot(&atom).sqrt(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_ksvd_does_not_increase_error() {
        let signal = make_sparse_coded_signal(150, 20, 12, 3, 5).unwrap();
        let y = signal.y().view();
        let mut d = random_dictionary(12, 20, 2);
        crate::dense::scale_atoms(&mut d);
        let mut x = Omp::new(3).encode(y, d.view(), None).unwrap();

        let before = reconstruction_error(y, d.view(), x.view()).unwrap();
        Ksvd::new().update(y, &mut d, &mut x).unwrap();
        let after = reconstruction_error(y, d.view(), x.view()).unwrap();

        assert!(after <= before * (1.0 + 1e-10), "before = {}, after = {}", before, after);
    }

    #[test]
    fn test_ksvd_reinitializes_unused_atom() {
        // second atom is never used, the worst-represented signal is the second one
        let y = array![[1.0, 0.0], [0.0, 2.0]];
        let mut d = array![[1.0, 0.5], [0.0, 0.5]];
        let mut x = array![[1.0, 0.0], [0.0, 0.0]];

        Ksvd::new().update(y.view(), &mut d, &mut x).unwrap();

        assert_abs_diff_eq!(d[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d[[1, 1]], 1.0, epsilon = 1e-12);
        // codes of the reinitialized atom stay empty
        assert_eq!(x.row(1).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_ksvd_keeps_unused_atom_when_disabled() {
        let y = array![[1.0, 0.0], [0.0, 2.0]];
        let mut d = array![[1.0, 0.5], [0.0, 0.5]];
        let mut x = array![[1.0, 0.0], [0.0, 0.0]];

        Ksvd::new()
            .reinitialize_unused(false)
            .update(y.view(), &mut d, &mut x)
            .unwrap();

        assert_eq!(d[[0, 1]], 0.5);
        assert_eq!(d[[1, 1]], 0.5);
    }

    #[test]
    fn test_ksvd_keeps_support_when_singular_vector_vanishes() {
        // the leading right singular vector is (1, 0): the second sample gets no weight
        let y = array![[3.0, 0.0], [0.0, 1.0]];
        let mut d = array![[1.0], [0.0]];
        let mut x = array![[3.0, 0.5]];
        let before = reconstruction_error(y.view(), d.view(), x.view()).unwrap();

        Ksvd::new().update(y.view(), &mut d, &mut x).unwrap();

        assert_eq!(x.mapv(|v| v != 0.0), array![[true, true]]);
        assert_abs_diff_eq!(x[[0, 0]].abs(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[[0, 1]].abs(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.column(0).dot(&d.column(0)), 1.0, epsilon = 1e-12);

        let after = reconstruction_error(y.view(), d.view(), x.view()).unwrap();
        assert!(after <= before + 1e-12, "before = {}, after = {}", before, after);
    }

    #[test]
    fn test_ksvd_shape_mismatch() {
        let y = Array2::<f64>::zeros((3, 4));
        let mut d = Array2::<f64>::zeros((3, 2));
        let mut x = Array2::<f64>::zeros((3, 4));
        assert!(Ksvd::new().update(y.view(), &mut d, &mut x).is_err());
    }
}
