//! Weight direction of a neuron from its cluster's gradient jumps.

use ndarray::{Array1, Array2};

use super::error::{ExtractionError, Result};
use super::linalg::top_right_singular_vector;
use super::types::{CriticalPoint, NeuronCluster};

/// Unit weight direction shared by a cluster's jumps.
///
/// Stacks the raw member jumps row-wise and returns the top right-singular
/// vector. Its sign is canonical (largest-magnitude component positive),
/// not meaningful; calibration fixes the real sign.
pub fn solve_direction(cluster: &NeuronCluster, points: &[CriticalPoint]) -> Result<Array1<f64>> {
    let first = cluster
        .members
        .first()
        .and_then(|&i| points.get(i))
        .ok_or_else(|| ExtractionError::Linalg("direction solve on an empty cluster".to_string()))?;
    let dim = first.gradient_jump.len();

    let mut stacked = Array2::zeros((cluster.len(), dim));
    for (mut row, &member) in stacked.rows_mut().into_iter().zip(&cluster.members) {
        let point = points.get(member).ok_or_else(|| {
            ExtractionError::Linalg(format!("cluster member {member} out of range"))
        })?;
        if point.gradient_jump.len() != dim {
            return Err(ExtractionError::ShapeMismatch {
                expected: vec![dim],
                got: vec![point.gradient_jump.len()],
            });
        }
        row.assign(&point.gradient_jump);
    }

    let mut direction = top_right_singular_vector(stacked.view())?;
    canonicalize_sign(&mut direction);
    Ok(direction)
}

/// Flip `v` so its largest-magnitude component is positive.
pub(crate) fn canonicalize_sign(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
