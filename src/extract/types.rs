//! Records produced and consumed by the extraction phases.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::error::{ExtractionError, Result};
use super::linalg::{norm, unit};
use crate::oracle::{
    check_input, relu_forward, relu_hidden, relu_jacobian, Oracle, OracleResult,
};

/// A point where exactly one hidden unit's pre-activation crosses zero.
///
/// `location == origin + offset * direction`. Created by the finder and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPoint {
    /// Point on the activation boundary
    pub location: Array1<f64>,
    /// Start of the line search that found it
    pub origin: Array1<f64>,
    /// Unit search direction
    pub direction: Array1<f64>,
    /// Distance from `origin` along `direction`
    pub offset: f64,
    /// Jacobian row the jump was recorded for
    pub class_index: usize,
    /// Difference of that row across the boundary
    pub gradient_jump: Array1<f64>,
    /// σ₂/σ₁ of the full Jacobian jump
    pub jump_rank_ratio: f64,
}

impl CriticalPoint {
    /// Euclidean norm of the recorded jump.
    pub fn jump_norm(&self) -> f64 {
        norm(self.gradient_jump.view())
    }

    /// Jump direction with unit norm, `None` for a zero jump.
    pub fn unit_jump(&self) -> Option<Array1<f64>> {
        unit(self.gradient_jump.view())
    }
}

/// Critical points attributed to one hidden neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronCluster {
    /// Indices into the critical point list, ascending
    pub members: Vec<usize>,
    /// Unit mean of the sign-aligned member jump directions
    pub representative: Array1<f64>,
    direction_sum: Array1<f64>,
}

impl NeuronCluster {
    /// Start a cluster from a single point's unit jump.
    pub fn seed(index: usize, unit_jump: ArrayView1<'_, f64>) -> Self {
        Self {
            members: vec![index],
            representative: unit_jump.to_owned(),
            direction_sum: unit_jump.to_owned(),
        }
    }

    /// |cos| between `unit_jump` and the representative.
    pub fn similarity(&self, unit_jump: ArrayView1<'_, f64>) -> f64 {
        self.representative.dot(&unit_jump).abs()
    }

    /// Add a point, flipping its direction onto the representative's side.
    pub fn absorb(&mut self, index: usize, unit_jump: ArrayView1<'_, f64>) {
        if self.representative.dot(&unit_jump) >= 0.0 {
            self.direction_sum += &unit_jump;
        } else {
            self.direction_sum -= &unit_jump;
        }
        self.members.push(index);
        self.refresh();
    }

    /// Fold another cluster into this one.
    pub fn merge(&mut self, other: NeuronCluster) {
        if self.representative.dot(&other.representative) >= 0.0 {
            self.direction_sum += &other.direction_sum;
        } else {
            self.direction_sum -= &other.direction_sum;
        }
        self.members.extend(other.members);
        self.members.sort_unstable();
        self.refresh();
    }

    /// Number of member points.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the cluster has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn refresh(&mut self) {
        // Opposite-sign sums cannot cancel: every term was aligned first.
        if let Some(rep) = unit(self.direction_sum.view()) {
            self.representative = rep;
        }
    }
}

/// Recovered first-layer parameters of one hidden neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronSignature {
    /// Unit-norm weight row with the true activation sign
    pub weights: Array1<f64>,
    /// Bias on the same scale as `weights`
    pub bias: f64,
    /// Index of the source cluster
    pub cluster: usize,
    /// max |w·x + b| over the cluster's critical points
    pub boundary_residual: f64,
    /// Sign probes used; 0 when the sign came from the layer-wide fit
    pub probe_attempts: usize,
}

/// Recovered network `W1 · relu(W0 · x + b0) + b1`.
///
/// Hidden units are in cluster order and have unit-norm rows in `w0`; the
/// positive scale of each victim neuron lives in the matching `w1` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedModel {
    /// First-layer weights (k × n)
    pub w0: Array2<f64>,
    /// First-layer bias (k)
    pub b0: Array1<f64>,
    /// Second-layer weights (m × k)
    pub w1: Array2<f64>,
    /// Second-layer bias (m)
    pub b1: Array1<f64>,
}

impl ExtractedModel {
    /// Assemble a model from calibrated neurons and a solved output layer.
    pub fn from_signatures(
        signatures: &[NeuronSignature],
        w1: Array2<f64>,
        b1: Array1<f64>,
    ) -> Result<Self> {
        let w0 = stack_weights(signatures)?;
        let b0: Array1<f64> = signatures.iter().map(|s| s.bias).collect();
        if w1.ncols() != signatures.len() || w1.nrows() != b1.len() {
            return Err(ExtractionError::ShapeMismatch {
                expected: vec![b1.len(), signatures.len()],
                got: w1.shape().to_vec(),
            });
        }
        Ok(Self { w0, b0, w1, b1 })
    }

    /// Number of recovered hidden units.
    pub fn hidden_width(&self) -> usize {
        self.w0.nrows()
    }

    /// Hidden activations at `x`.
    pub fn hidden(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        relu_hidden(self.w0.view(), self.b0.view(), x)
    }

    /// Logits at `x`.
    pub fn predict(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        Ok(self.output(x)?)
    }
}

impl Oracle for ExtractedModel {
    fn input_dim(&self) -> usize {
        self.w0.ncols()
    }

    fn output_dim(&self) -> usize {
        self.w1.nrows()
    }

    fn output(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array1<f64>> {
        check_input(self.input_dim(), x)?;
        Ok(relu_forward(self.w0.view(), self.b0.view(), self.w1.view(), self.b1.view(), x))
    }

    fn jacobian(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array2<f64>> {
        check_input(self.input_dim(), x)?;
        Ok(relu_jacobian(self.w0.view(), self.b0.view(), self.w1.view(), x))
    }
}

/// Stack signature weights into a (k × n) matrix.
pub(crate) fn stack_weights(signatures: &[NeuronSignature]) -> Result<Array2<f64>> {
    let n = signatures.first().map_or(0, |s| s.weights.len());
    let mut w0 = Array2::zeros((signatures.len(), n));
    for (mut row, sig) in w0.rows_mut().into_iter().zip(signatures) {
        if sig.weights.len() != n {
            return Err(ExtractionError::ShapeMismatch {
                expected: vec![n],
                got: vec![sig.weights.len()],
            });
        }
        row.assign(&sig.weights);
    }
    Ok(w0)
}
