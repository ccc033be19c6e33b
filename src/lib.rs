pub mod coding;
pub mod dense;
pub mod learning;
pub mod metrics;
pub mod patches;
pub mod svd;
pub mod synthetic;
pub mod update;
mod utils;

pub use utils::nonzero_per_column;
pub use utils::Direction;
