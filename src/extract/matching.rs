//! Permutation-invariant comparison of a recovered model with a reference.
//!
//! Hidden units come back in arbitrary order with unit-norm weight rows.
//! Recovered neurons are paired with reference neurons by maximising the
//! total |cos| of their weight rows (Hungarian assignment), then each
//! reference neuron is normalised to unit weight norm before comparing.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::linalg::{abs_cosine, norm};
use super::types::ExtractedModel;
use crate::oracle::ReluNetwork;

/// One recovered/reference neuron pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronMatch {
    pub recovered: usize,
    pub reference: usize,
    /// |cos| between the two weight rows
    pub similarity: f64,
}

/// Parameter errors after matching and normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub matches: Vec<NeuronMatch>,
    /// Max |w − w*/‖w*‖| over matched rows
    pub max_weight_error: f64,
    /// Max |b − b*/‖w*‖| over matched neurons
    pub max_bias_error: f64,
    /// Max |W1[:, i] − ‖w*‖·W1*[:, j]| over matched neurons
    pub max_output_weight_error: f64,
    /// Max |b1 − b1*|
    pub output_bias_error: f64,
    /// Every matched pair points the same way
    pub signs_agree: bool,
    pub unmatched_recovered: usize,
    pub unmatched_reference: usize,
}

impl ModelComparison {
    /// All errors within `tolerance`, signs agree and nothing is unmatched.
    pub fn within(&self, tolerance: f64) -> bool {
        self.signs_agree
            && self.unmatched_recovered == 0
            && self.unmatched_reference == 0
            && self.max_weight_error <= tolerance
            && self.max_bias_error <= tolerance
            && self.max_output_weight_error <= tolerance
            && self.output_bias_error <= tolerance
    }
}

/// Pair rows of `recovered` with rows of `reference` maximising total |cos|.
///
/// Returns `min(k, k*)` matches ordered by recovered index.
pub fn match_neurons(
    recovered: ArrayView2<'_, f64>,
    reference: ArrayView2<'_, f64>,
) -> Vec<NeuronMatch> {
    let (k, k_ref) = (recovered.nrows(), reference.nrows());
    if k == 0 || k_ref == 0 {
        return Vec::new();
    }
    let similarity = Array2::from_shape_fn((k, k_ref), |(i, j)| {
        abs_cosine(recovered.row(i), reference.row(j))
    });

    let pairs: Vec<(usize, usize)> = if k <= k_ref {
        assign(&similarity.mapv(|s| 1.0 - s)).into_iter().enumerate().collect()
    } else {
        let cost = similarity.t().mapv(|s| 1.0 - s);
        assign(&cost).into_iter().enumerate().map(|(j, i)| (i, j)).collect()
    };

    let mut matches: Vec<NeuronMatch> = pairs
        .into_iter()
        .map(|(i, j)| NeuronMatch { recovered: i, reference: j, similarity: similarity[[i, j]] })
        .collect();
    matches.sort_by_key(|m| m.recovered);
    matches
}

/// Minimum-cost assignment of every row to a distinct column
/// (`rows <= cols`), via the potentials form of the Hungarian algorithm.
fn assign(cost: &Array2<f64>) -> Vec<usize> {
    let (n, m) = cost.dim();
    // 1-based with a virtual column 0
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut owner = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let reduced = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                if reduced < min_v[j] {
                    min_v[j] = reduced;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0; n];
    for j in 1..=m {
        if owner[j] > 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    assignment
}

/// Match `recovered` against `reference` and measure every parameter error
/// in the unit-norm convention.
pub fn compare_models(recovered: &ExtractedModel, reference: &ReluNetwork) -> ModelComparison {
    let matches = match_neurons(recovered.w0.view(), reference.w0.view());

    let mut max_weight_error: f64 = 0.0;
    let mut max_bias_error: f64 = 0.0;
    let mut max_output_weight_error: f64 = 0.0;
    let mut signs_agree = true;
    for m in &matches {
        let w = recovered.w0.row(m.recovered);
        let w_ref = reference.w0.row(m.reference);
        let scale = norm(w_ref);
        if scale == 0.0 {
            signs_agree = false;
            continue;
        }
        let w_ref = &w_ref / scale;
        if w.dot(&w_ref) <= 0.0 {
            signs_agree = false;
        }
        for (a, b) in w.iter().zip(w_ref.iter()) {
            max_weight_error = max_weight_error.max((a - b).abs());
        }
        let bias_ref = reference.b0[m.reference] / scale;
        max_bias_error = max_bias_error.max((recovered.b0[m.recovered] - bias_ref).abs());

        let column = recovered.w1.column(m.recovered);
        let column_ref = reference.w1.column(m.reference);
        for (a, b) in column.iter().zip(column_ref.iter()) {
            max_output_weight_error = max_output_weight_error.max((a - b * scale).abs());
        }
    }

    let output_bias_error = if recovered.b1.len() == reference.b1.len() {
        recovered
            .b1
            .iter()
            .zip(reference.b1.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    } else {
        f64::INFINITY
    };

    ModelComparison {
        unmatched_recovered: recovered.hidden_width() - matches.len(),
        unmatched_reference: reference.hidden_width() - matches.len(),
        matches,
        max_weight_error,
        max_bias_error,
        max_output_weight_error,
        output_bias_error,
        signs_agree,
    }
}
