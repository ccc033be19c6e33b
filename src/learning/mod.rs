//! # Dictionary learning drivers
//!
//! Alternating minimization of `||Y - D X||^2` over the dictionary `D` and the
//! sparse codes `X`.
//!
//! - [`BatchLearner`]: every iteration codes all signals, then updates the
//!   dictionary. Generic over any [`SparseCoder`](crate::coding::SparseCoder)
//!   and [`DictionaryUpdater`](crate::update::DictionaryUpdater), with
//!   K-SVD and Forward-Backward presets.
//! - [`OnlineLearner`]: one signal per step, Lasso coding and the online
//!   matrix factorization update of Mairal et al.
//!
//! Drivers keep no state between calls; everything they produce is returned in
//! a report.

mod batch;
mod online;

pub use batch::{BatchLearner, BatchLearnerBuilder, LearningReport};
pub use online::{OnlineLearner, OnlineLearnerBuilder, OnlineReport};
