//! Square patches of a grayscale image, flattened into signal columns.
//!
//! Images are passed in already decoded as `(height × width)` arrays. A patch
//! of side `width` becomes a column of length `width * width` in row-major order.

use anyhow::bail;
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dense::Center;
use crate::utils::Direction;

/// Candidate patches drawn per requested patch in [`high_energy_patches`].
const ENERGY_POOL_FACTOR: usize = 10;

fn check_patch_width(image: &ArrayView2<f64>, width: usize) -> anyhow::Result<()> {
    if width == 0 {
        bail!("Patch width must be at least 1");
    }
    if width > image.nrows() || width > image.ncols() {
        bail!(
            "Patch width {} does not fit in an image of shape {:?}",
            width,
            image.dim()
        );
    }
    Ok(())
}

/// Extracts `n_patches` patches at uniformly drawn positions (with replacement).
pub fn random_patches(
    image: ArrayView2<f64>,
    width: usize,
    n_patches: usize,
    seed: u64,
) -> anyhow::Result<Array2<f64>> {
    check_patch_width(&image, width)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let max_row = image.nrows() - width;
    let max_col = image.ncols() - width;

    let mut patches = Array2::zeros((width * width, n_patches));
    for mut column in patches.axis_iter_mut(Axis(1)) {
        let r = rng.random_range(0..=max_row);
        let c = rng.random_range(0..=max_col);
        let patch = image.slice(s![r..r + width, c..c + width]);
        for (dst, &src) in column.iter_mut().zip(patch.iter()) {
            *dst = src;
        }
    }
    Ok(patches)
}

/// Extracts the `n_patches` highest-energy patches out of a random pool.
///
/// Energy is the squared L2 norm of the patch with its mean removed, so flat
/// regions are skipped regardless of their brightness. The returned patches are
/// not centred.
pub fn high_energy_patches(
    image: ArrayView2<f64>,
    width: usize,
    n_patches: usize,
    seed: u64,
) -> anyhow::Result<Array2<f64>> {
    let pool = random_patches(image, width, n_patches * ENERGY_POOL_FACTOR, seed)?;
    let mut centred = pool.clone();
    centred.center(&Direction::COLUMN);

    let mut order: Vec<(usize, f64)> = centred
        .axis_iter(Axis(1))
        .map(|p| p.dot(&p))
        .enumerate()
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let selected: Vec<usize> = order.iter().take(n_patches).map(|&(i, _)| i).collect();
    Ok(pool.select(Axis(1), &selected))
}

/// Reshapes a flattened patch (or atom) back into a `width × width` square.
pub fn to_patch(column: ArrayView1<f64>, width: usize) -> anyhow::Result<Array2<f64>> {
    if column.len() != width * width {
        bail!(
            "Column of length {} is not a {}x{} patch",
            column.len(),
            width,
            width
        );
    }
    Ok(Array2::from_shape_vec((width, width), column.to_vec())?)
}
