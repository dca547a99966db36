//! Analytic two-layer ReLU classifier.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::error::{OracleError, OracleResult};
use super::{check_input, Oracle};

/// Two-layer feed-forward classifier `W1 · relu(W0 · x + b0) + b1`.
///
/// Serves as the reference victim in tests and in the `synth` CLI command.
///
/// # Example
///
/// ```
/// use extraer::oracle::{Oracle, ReluNetwork};
/// use ndarray::arr1;
///
/// let net = ReluNetwork::random(4, 3, 2, 7);
/// let logits = net.output(arr1(&[0.1, -0.2, 0.3, 0.0]).view()).unwrap();
/// assert_eq!(logits.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReluNetwork {
    /// First-layer weights, shape `(hidden, input)`.
    pub w0: Array2<f64>,
    /// First-layer bias, length `hidden`.
    pub b0: Array1<f64>,
    /// Second-layer weights, shape `(output, hidden)`.
    pub w1: Array2<f64>,
    /// Second-layer bias, length `output`.
    pub b1: Array1<f64>,
}

impl ReluNetwork {
    /// Build a network from explicit parameters, checking shapes.
    pub fn new(
        w0: Array2<f64>,
        b0: Array1<f64>,
        w1: Array2<f64>,
        b1: Array1<f64>,
    ) -> OracleResult<Self> {
        let hidden = w0.nrows();
        if b0.len() != hidden {
            return Err(OracleError::ShapeMismatch {
                what: "b0",
                expected: vec![hidden],
                got: vec![b0.len()],
            });
        }
        if w1.ncols() != hidden {
            return Err(OracleError::ShapeMismatch {
                what: "w1",
                expected: vec![w1.nrows(), hidden],
                got: w1.shape().to_vec(),
            });
        }
        if b1.len() != w1.nrows() {
            return Err(OracleError::ShapeMismatch {
                what: "b1",
                expected: vec![w1.nrows()],
                got: vec![b1.len()],
            });
        }
        Ok(Self { w0, b0, w1, b1 })
    }

    /// Random network with standard-normal weights.
    ///
    /// First-layer biases are drawn with scale 0.5 so every hyperplane passes
    /// close to the origin, where standard-normal sample pools live.
    pub fn random(input_dim: usize, hidden: usize, output: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut normal = |scale: f64| scale * rng.sample::<f64, _>(StandardNormal);
        let w0 = Array2::from_shape_fn((hidden, input_dim), |_| normal(1.0));
        let b0 = Array1::from_shape_fn(hidden, |_| normal(0.5));
        let w1 = Array2::from_shape_fn((output, hidden), |_| normal(1.0));
        let b1 = Array1::from_shape_fn(output, |_| normal(0.1));
        Self { w0, b0, w1, b1 }
    }

    /// Number of hidden units.
    pub fn hidden_width(&self) -> usize {
        self.w0.nrows()
    }

    /// Hidden activations `relu(W0 · x + b0)`.
    pub fn hidden(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        relu_hidden(self.w0.view(), self.b0.view(), x)
    }
}

impl Oracle for ReluNetwork {
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

pub(crate) fn relu_hidden(
    w0: ArrayView2<'_, f64>,
    b0: ArrayView1<'_, f64>,
    x: ArrayView1<'_, f64>,
) -> Array1<f64> {
    (w0.dot(&x) + b0).mapv(|z| z.max(0.0))
}

pub(crate) fn relu_forward(
    w0: ArrayView2<'_, f64>,
    b0: ArrayView1<'_, f64>,
    w1: ArrayView2<'_, f64>,
    b1: ArrayView1<'_, f64>,
    x: ArrayView1<'_, f64>,
) -> Array1<f64> {
    w1.dot(&relu_hidden(w0, b0, x)) + b1
}

/// `W1 · diag(1[z > 0]) · W0`. Depends on `x` only through the activation
/// pattern, so two points with the same pattern give bit-identical results.
pub(crate) fn relu_jacobian(
    w0: ArrayView2<'_, f64>,
    b0: ArrayView1<'_, f64>,
    w1: ArrayView2<'_, f64>,
    x: ArrayView1<'_, f64>,
) -> Array2<f64> {
    let pre = w0.dot(&x) + b0;
    let mut gated = w1.to_owned();
    for (mut column, &z) in gated.columns_mut().into_iter().zip(pre.iter()) {
        if z <= 0.0 {
            column.fill(0.0);
        }
    }
    gated.dot(&w0)
}
