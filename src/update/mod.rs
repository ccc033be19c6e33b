//! # Dictionary update
//!
//! Given signals `Y` and codes `X`, a dictionary updater improves the atoms of
//! `D` to reduce `||Y - D X||^2`. Atoms are never added or removed.
//!
//! ## Available updaters
//! - [`Ksvd`]: per-atom rank-1 SVD corrections, also rewrites the nonzero code values
//! - [`ForwardBackwardUpdate`]: projected gradient steps on `D`
//! - [`Omf`]: block-coordinate descent on the running statistics of the online
//!   learner ([`SufficientStatistics`]), one call per streamed sample

use ndarray::{Array2, ArrayView2};

mod forward_backward;
mod ksvd;
mod omf;

pub use forward_backward::ForwardBackwardUpdate;
pub use ksvd::Ksvd;
pub use omf::{Omf, SufficientStatistics};

/// A batch dictionary update working on the full signal and code matrices.
pub trait DictionaryUpdater: Send + Sync {
    /// Updates `dictionary` in place. Implementations may also rewrite the
    /// values of `codes` but never change their shape.
    fn update(
        &self,
        y: ArrayView2<f64>,
        dictionary: &mut Array2<f64>,
        codes: &mut Array2<f64>,
    ) -> anyhow::Result<()>;
}
