use ndarray::{Array2, Axis, ScalarOperand};
use num_traits::Float;

use crate::utils::Direction;

/// Rescales every row or column of a dense matrix to unit L2 norm.
///
/// Lanes with zero norm are left untouched, so a dead atom stays at zero
/// instead of turning into NaNs.
pub trait Normalize<T: Float> {
    fn normalize(&mut self, direction: &Direction);
}

/// Removes the mean of every row or column.
pub trait Center<T: Float> {
    fn center(&mut self, direction: &Direction);
}

impl<T: Float + ScalarOperand> Normalize<T> for Array2<T> {
    fn normalize(&mut self, direction: &Direction) {
        let axis = match direction {
            Direction::ROW => Axis(0),
            Direction::COLUMN => Axis(1),
        };
        for mut lane in self.axis_iter_mut(axis) {
            let norm = lane.iter().fold(T::zero(), |acc, &v| acc + v * v).sqrt();
            if norm > T::zero() {
                lane.mapv_inplace(|v| v / norm);
            }
        }
    }
}

impl<T: Float + ScalarOperand> Center<T> for Array2<T> {
    fn center(&mut self, direction: &Direction) {
        let axis = match direction {
            Direction::ROW => Axis(0),
            Direction::COLUMN => Axis(1),
        };
        for mut lane in self.axis_iter_mut(axis) {
            if lane.is_empty() {
                continue;
            }
            let n = T::from(lane.len()).unwrap_or_else(T::one);
            let mean = lane.iter().fold(T::zero(), |acc, &v| acc + v) / n;
            lane.mapv_inplace(|v| v - mean);
        }
    }
}

/// Rescales the atoms (columns) of a dictionary to unit norm.
pub fn scale_atoms(dictionary: &mut Array2<f64>) {
    dictionary.normalize(&Direction::COLUMN);
}
