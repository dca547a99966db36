//! Dense linear algebra helpers bridging ndarray and nalgebra.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::error::{ExtractionError, Result};

pub(crate) fn to_dmatrix(a: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Singular values in descending order.
pub(crate) fn singular_values(a: ArrayView2<'_, f64>) -> Vec<f64> {
    if a.is_empty() {
        return Vec::new();
    }
    let mut values: Vec<f64> = to_dmatrix(a).singular_values().iter().copied().collect();
    values.sort_by(|x, y| y.total_cmp(x));
    values
}

/// Largest singular value and the σ₂/σ₁ ratio (0 for rank ≤ 1 shapes).
pub(crate) fn spectral_profile(a: ArrayView2<'_, f64>) -> (f64, f64) {
    let values = singular_values(a);
    let s1 = values.first().copied().unwrap_or(0.0);
    let s2 = values.get(1).copied().unwrap_or(0.0);
    let ratio = if s1 > 0.0 { s2 / s1 } else { 0.0 };
    (s1, ratio)
}

/// Number of singular values above `rel_tol · σ₁`.
pub(crate) fn numerical_rank(a: ArrayView2<'_, f64>, rel_tol: f64) -> usize {
    let values = singular_values(a);
    match values.first() {
        Some(&s1) if s1 > 0.0 => values.iter().filter(|&&s| s > rel_tol * s1).count(),
        _ => 0,
    }
}

/// Right singular vector of the largest singular value.
///
/// Taken from the top eigenvector of the smaller Gram matrix: `AᵀA`
/// directly, or `AAᵀ` mapped back through `Aᵀ` when `A` is wide. The thin
/// SVD of a wide, exactly rank-1 stack can return a rotated `Vᵀ` row; the
/// symmetric eigensolver does not.
pub(crate) fn top_right_singular_vector(a: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    if a.is_empty() {
        return Err(ExtractionError::Linalg("SVD of an empty matrix".to_string()));
    }
    let m = to_dmatrix(a);
    let wide = m.nrows() < m.ncols();
    let gram = if wide { &m * m.transpose() } else { m.transpose() * &m };
    let eigen = gram.symmetric_eigen();
    let top = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|(_, x), (_, y)| x.total_cmp(y))
        .map(|(i, _)| i)
        .ok_or_else(|| ExtractionError::Linalg("eigensolver produced no eigenvalues".to_string()))?;
    let y = eigen.eigenvectors.column(top);
    let v: Array1<f64> = if wide {
        (m.transpose() * y).iter().copied().collect()
    } else {
        y.iter().copied().collect()
    };
    unit(v.view()).ok_or_else(|| ExtractionError::Linalg("degenerate top eigenvector".to_string()))
}

/// Moore–Penrose pseudo-inverse, dropping singular values below
/// `rel_tol · σ₁`.
pub(crate) fn pseudo_inverse(a: ArrayView2<'_, f64>, rel_tol: f64) -> Result<Array2<f64>> {
    let s1 = singular_values(a).first().copied().unwrap_or(0.0);
    let pinv = to_dmatrix(a)
        .svd(true, true)
        .pseudo_inverse(rel_tol * s1)
        .map_err(|e| ExtractionError::Linalg(e.to_string()))?;
    Ok(from_dmatrix(&pinv))
}

/// Minimum-norm least-squares solution of `A · X = B`.
pub(crate) fn least_squares(
    a: ArrayView2<'_, f64>,
    b: ArrayView2<'_, f64>,
    rel_tol: f64,
) -> Result<Array2<f64>> {
    if a.nrows() != b.nrows() {
        return Err(ExtractionError::ShapeMismatch {
            expected: vec![a.nrows(), b.ncols()],
            got: b.shape().to_vec(),
        });
    }
    let s1 = singular_values(a).first().copied().unwrap_or(0.0);
    let solution = to_dmatrix(a)
        .svd(true, true)
        .solve(&to_dmatrix(b), rel_tol * s1)
        .map_err(|e| ExtractionError::Linalg(e.to_string()))?;
    Ok(from_dmatrix(&solution))
}

pub(crate) fn norm(v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&v).sqrt()
}

pub(crate) fn unit(v: ArrayView1<'_, f64>) -> Option<Array1<f64>> {
    let n = norm(v);
    if n > 0.0 && n.is_finite() {
        Some(&v / n)
    } else {
        None
    }
}

/// |cos θ| between two vectors; 0 if either is zero.
pub(crate) fn abs_cosine(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let denom = norm(a) * norm(b);
    if denom > 0.0 {
        (a.dot(&b) / denom).abs().min(1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_rank_of_outer_product_is_one() {
        let a = arr2(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0]]);
        assert_eq!(numerical_rank(a.view(), 1e-9), 1);
        let (s1, ratio) = spectral_profile(a.view());
        assert!(s1 > 0.0);
        assert!(ratio < 1e-12);
    }

    #[test]
    fn test_top_singular_vector_of_rank_one_stack() {
        let a = arr2(&[[3.0, 4.0], [-6.0, -8.0], [0.3, 0.4]]);
        let v = top_right_singular_vector(a.view()).unwrap();
        assert_abs_diff_eq!(v[0].abs(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1].abs(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_top_singular_vector_of_wide_rank_one_stack() {
        let w = arr1(&[0.3, -1.2, 0.7, 2.1, -0.4, 0.05, 1.6, -0.9]);
        let scales = [1.7, -0.2, 3.1, -1.7, 0.9, 1.7, -3.1];
        let a = Array2::from_shape_fn((scales.len(), w.len()), |(i, j)| scales[i] * w[j]);
        let v = top_right_singular_vector(a.view()).unwrap();
        assert_abs_diff_eq!(norm(v.view()), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(abs_cosine(v.view(), w.view()), 1.0, epsilon = 1e-9);

        let tall = a.t().to_owned();
        let u = top_right_singular_vector(tall.view()).unwrap();
        let expected = arr1(&scales);
        assert_abs_diff_eq!(abs_cosine(u.view(), expected.view()), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pseudo_inverse_of_wide_matrix_is_right_inverse() {
        let u = arr2(&[[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
        let pinv = pseudo_inverse(u.view(), 1e-12).unwrap();
        assert_eq!(pinv.shape(), &[3, 2]);
        let product = u.dot(&pinv);
        assert_abs_diff_eq!(product[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(product[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(product[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_least_squares_recovers_exact_solution() {
        let a = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let x = arr2(&[[2.0], [-1.0]]);
        let b = a.dot(&x);
        let solved = least_squares(a.view(), b.view(), 1e-12).unwrap();
        assert_abs_diff_eq!(solved[[0, 0]], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(solved[[1, 0]], -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_unit_and_cosine() {
        assert!(unit(arr1(&[0.0, 0.0]).view()).is_none());
        let u = unit(arr1(&[3.0, 4.0]).view()).unwrap();
        assert_abs_diff_eq!(norm(u.view()), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(abs_cosine(arr1(&[1.0, 0.0]).view(), arr1(&[-2.0, 0.0]).view()), 1.0);
        assert_abs_diff_eq!(abs_cosine(arr1(&[1.0, 0.0]).view(), arr1(&[0.0, 0.0]).view()), 0.0);
    }
}
