//! Random draws: search lines, sample pools and perturbed query points.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::linalg::unit;

/// One line search: scan `origin + t·direction` for `t` in `[0, bound]`.
#[derive(Debug, Clone)]
pub(crate) struct LineTask {
    pub origin: Array1<f64>,
    pub direction: Array1<f64>,
    pub bound: f64,
}

/// Uniformly random unit vector.
pub(crate) fn random_unit<R: Rng>(rng: &mut R, dim: usize) -> Array1<f64> {
    loop {
        let v = Array1::from_shape_fn(dim, |_| rng.sample::<f64, _>(StandardNormal));
        if let Some(u) = unit(v.view()) {
            return u;
        }
    }
}

/// Line centred on a random pool row along a random direction.
pub(crate) fn line_task<R: Rng>(rng: &mut R, pool: ArrayView2<'_, f64>, bound: f64) -> LineTask {
    let anchor = pool.row(rng.random_range(0..pool.nrows()));
    let direction = random_unit(rng, pool.ncols());
    let origin = &anchor - &(&direction * (bound / 2.0));
    LineTask { origin, direction, bound }
}

/// `count` points, each an anchor (cycled in order) plus Gaussian noise of
/// scale `spread`.
pub(crate) fn perturbed_samples<R: Rng>(
    rng: &mut R,
    anchors: &[ArrayView1<'_, f64>],
    count: usize,
    spread: f64,
) -> Array2<f64> {
    let dim = anchors.first().map_or(0, |a| a.len());
    let mut samples = Array2::zeros((count, dim));
    if anchors.is_empty() {
        return samples;
    }
    for (i, mut row) in samples.rows_mut().into_iter().enumerate() {
        let anchor = &anchors[i % anchors.len()];
        for (dst, &a) in row.iter_mut().zip(anchor.iter()) {
            *dst = a + spread * rng.sample::<f64, _>(StandardNormal);
        }
    }
    samples
}

/// Seeded standard-normal sample pool of shape `(n, dim)`.
///
/// ```
/// use extraer::extract::gaussian_pool;
///
/// let pool = gaussian_pool(16, 4, 3);
/// assert_eq!(pool.shape(), &[16, 4]);
/// assert_eq!(pool, gaussian_pool(16, 4, 3));
/// ```
pub fn gaussian_pool(n: usize, dim: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n, dim), |_| rng.sample::<f64, _>(StandardNormal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::extract::linalg::norm;

    #[test]
    fn test_line_task_is_centred_on_pool_row() {
        let pool = gaussian_pool(5, 3, 9);
        let mut rng = StdRng::seed_from_u64(1);
        let task = line_task(&mut rng, pool.view(), 10.0);
        assert_abs_diff_eq!(norm(task.direction.view()), 1.0, epsilon = 1e-12);
        let midpoint = &task.origin + &(&task.direction * 5.0);
        let hit = pool
            .rows()
            .into_iter()
            .any(|row| row.iter().zip(midpoint.iter()).all(|(a, b)| (a - b).abs() < 1e-9));
        assert!(hit);
    }

    #[test]
    fn test_perturbed_samples_with_zero_spread_repeat_anchors() {
        let pool = gaussian_pool(2, 3, 4);
        let anchors: Vec<_> = pool.rows().into_iter().collect();
        let mut rng = StdRng::seed_from_u64(0);
        let samples = perturbed_samples(&mut rng, &anchors, 5, 0.0);
        assert_eq!(samples.row(0), pool.row(0));
        assert_eq!(samples.row(1), pool.row(1));
        assert_eq!(samples.row(4), pool.row(0));
    }
}
