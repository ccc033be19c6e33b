use anyhow::bail;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Running statistics of the online learner.
///
/// `A = Σ x xᵀ` (n_atoms × n_atoms) and `B = Σ y xᵀ` (signal_size × n_atoms)
/// summarize every sample seen so far, so the dictionary can be updated
/// without replaying past samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStatistics {
    a: Array2<f64>,
    b: Array2<f64>,
    n_seen: usize,
}

impl SufficientStatistics {
    pub fn new(signal_size: usize, n_atoms: usize) -> Self {
        SufficientStatistics {
            a: Array2::zeros((n_atoms, n_atoms)),
            b: Array2::zeros((signal_size, n_atoms)),
            n_seen: 0,
        }
    }

    /// Adds the rank-1 contribution of one sample: `A += x xᵀ`, `B += y xᵀ`.
    pub fn accumulate(&mut self, y: ArrayView1<f64>, x: ArrayView1<f64>) -> anyhow::Result<()> {
        if y.len() != self.b.nrows() {
            bail!(
                "Sample length ({}) does not match signal size ({})",
                y.len(),
                self.b.nrows()
            );
        }
        if x.len() != self.a.nrows() {
            bail!(
                "Code length ({}) does not match number of atoms ({})",
                x.len(),
                self.a.nrows()
            );
        }

        let x_row = x.insert_axis(Axis(0));
        self.a += &x.insert_axis(Axis(1)).dot(&x_row);
        self.b += &y.insert_axis(Axis(1)).dot(&x_row);
        self.n_seen += 1;
        Ok(())
    }

    pub fn a(&self) -> ArrayView2<'_, f64> {
        self.a.view()
    }

    pub fn b(&self) -> ArrayView2<'_, f64> {
        self.b.view()
    }

    pub fn n_seen(&self) -> usize {
        self.n_seen
    }

    pub fn signal_size(&self) -> usize {
        self.b.nrows()
    }

    pub fn n_atoms(&self) -> usize {
        self.a.nrows()
    }
}

/// Dictionary update of online matrix factorization (Mairal et al., 2009).
///
/// Block-coordinate descent over the atoms using only `A` and `B`:
/// `u_j = (b_j - D a_j) / A_jj + d_j`, `d_j = u_j / max(||u_j||, 1)`.
/// Atoms with `A_jj == 0` have not been used yet and are left untouched.
///
/// The atoms end up inside the unit ball; rescaling them to unit norm is up to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Omf {
    passes: usize,
}

impl Default for Omf {
    fn default() -> Self {
        Omf { passes: 1 }
    }
}

impl Omf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sweeps over all atoms per call.
    pub fn passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }

    pub fn update(
        &self,
        dictionary: &mut Array2<f64>,
        stats: &SufficientStatistics,
    ) -> anyhow::Result<()> {
        if dictionary.nrows() != stats.signal_size() || dictionary.ncols() != stats.n_atoms() {
            bail!(
                "Dictionary shape {:?} does not match statistics (signal size {}, {} atoms)",
                dictionary.dim(),
                stats.signal_size(),
                stats.n_atoms()
            );
        }

        let a = stats.a();
        let b = stats.b();

        for _ in 0..self.passes {
            for j in 0..dictionary.ncols() {
                let a_jj = a[[j, j]];
                if a_jj <= 0.0 {
                    continue;
                }

                let mut u: Array1<f64> = &b.column(j) - &dictionary.dot(&a.column(j));
                u /= a_jj;
                u += &dictionary.column(j);

                let norm = u.dot(&u).sqrt();
                if norm > 1.0 {
                    u /= norm;
                }
                dictionary.column_mut(j).assign(&u);
            }
        }

        Ok(())
    }
}
