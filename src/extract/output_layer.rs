//! Second-layer recovery by least squares.
//!
//! Once `W0` and `b0` are known the hidden activations `h(x)` can be
//! computed locally, and the logits are affine in them:
//! `y = W1·h + b1`. Stacking `[h(x) | 1]` over enough points gives a linear
//! system for `(W1, b1)`.

use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ExtractionError, Result};
use super::linalg::{least_squares, numerical_rank};
use super::types::{stack_weights, NeuronSignature};
use crate::oracle::{relu_hidden, Oracle};

/// Solved output layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLayer {
    /// (m × k)
    pub w1: Array2<f64>,
    /// (m)
    pub b1: Array1<f64>,
    /// Numerical rank of the design matrix
    pub rank: usize,
}

/// Solve `[h | 1]·θ = Y` over `samples` (one point per row).
///
/// Fails with `RankDeficientSolve` (with `attempts = 1`) when the design
/// matrix rank, measured relative to its largest singular value with
/// `rank_tolerance`, is below `k + 1`; callers resample and retry.
pub fn solve_output_layer<O: Oracle + ?Sized>(
    signatures: &[NeuronSignature],
    oracle: &O,
    samples: ArrayView2<'_, f64>,
    rank_tolerance: f64,
) -> Result<OutputLayer> {
    let k = signatures.len();
    let w0 = stack_weights(signatures)?;
    let b0: Array1<f64> = signatures.iter().map(|s| s.bias).collect();
    if k == 0 {
        return Err(ExtractionError::Linalg("output-layer solve without hidden neurons".to_string()));
    }
    if samples.ncols() != w0.ncols() {
        return Err(ExtractionError::ShapeMismatch {
            expected: vec![samples.nrows(), w0.ncols()],
            got: samples.shape().to_vec(),
        });
    }

    let m = oracle.output_dim();
    let mut design = Array2::ones((samples.nrows(), k + 1));
    let mut targets = Array2::zeros((samples.nrows(), m));
    for (i, x) in samples.rows().into_iter().enumerate() {
        let h = relu_hidden(w0.view(), b0.view(), x);
        design.slice_mut(s![i, ..k]).assign(&h);
        targets.row_mut(i).assign(&oracle.output(x)?);
    }

    let rank = numerical_rank(design.view(), rank_tolerance);
    if rank < k + 1 {
        debug!(rank, required = k + 1, samples = samples.nrows(), "design matrix rank-deficient");
        return Err(ExtractionError::RankDeficientSolve { rank, required: k + 1, attempts: 1 });
    }

    let theta = least_squares(design.view(), targets.view(), rank_tolerance)?;
    let w1 = theta.slice(s![..k, ..]).t().to_owned();
    let b1 = theta.row(k).to_owned();
    Ok(OutputLayer { w1, b1, rank })
}
