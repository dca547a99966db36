//! Oracle capability consumed by the extraction attack.
//!
//! The victim model is only ever reached through [`Oracle`]: a forward pass
//! returning the logit vector, and a Jacobian of the logits with respect to
//! the input. Framework-specific model wrappers implement this trait outside
//! the core; the adapters shipped here cover the cases the attack itself needs:
//!
//! - [`ReluNetwork`]: analytic two-layer ReLU classifier (reference victim)
//! - [`CountingOracle`]: query accounting around any oracle
//! - [`FiniteDifferenceOracle`]: Jacobians estimated from forward passes only

mod counting;
pub mod error;
mod finite_diff;
mod network;

#[cfg(test)]
mod tests;

use ndarray::{Array1, Array2, ArrayView1};

pub use counting::{CountingOracle, QueryCounts};
pub use error::{OracleError, OracleResult};
pub use finite_diff::FiniteDifferenceOracle;
pub use network::ReluNetwork;

pub(crate) use network::{relu_forward, relu_hidden, relu_jacobian};

/// Black-box access to a classifier: outputs and per-class gradients.
///
/// Implementations must be side-effect free from the caller's point of view
/// and tolerate queries at arbitrary, off-distribution points. Line searches
/// may query concurrently, hence the `Send + Sync` bound.
pub trait Oracle: Send + Sync {
    /// Number of input features.
    fn input_dim(&self) -> usize;

    /// Number of output classes.
    fn output_dim(&self) -> usize;

    /// Forward pass: logits at `x`.
    fn output(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array1<f64>>;

    /// Jacobian of the logits at `x`, shape `(output_dim, input_dim)`.
    fn jacobian(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array2<f64>>;

    /// Gradient of a single class logit at `x`.
    fn class_gradient(&self, x: ArrayView1<'_, f64>, class: usize) -> OracleResult<Array1<f64>> {
        let jacobian = self.jacobian(x)?;
        if class >= jacobian.nrows() {
            return Err(OracleError::ClassOutOfRange { index: class, classes: jacobian.nrows() });
        }
        Ok(jacobian.row(class).to_owned())
    }

    /// Index of the largest logit at `x`.
    fn predict_class(&self, x: ArrayView1<'_, f64>) -> OracleResult<usize> {
        let logits = self.output(x)?;
        argmax(logits.view()).ok_or(OracleError::NonFinite { query: "output" })
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn output_dim(&self) -> usize {
        (**self).output_dim()
    }

    fn output(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array1<f64>> {
        (**self).output(x)
    }

    fn jacobian(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array2<f64>> {
        (**self).jacobian(x)
    }
}

/// Check that a query point has the oracle's input dimension.
pub(crate) fn check_input(expected: usize, x: ArrayView1<'_, f64>) -> OracleResult<()> {
    if x.len() == expected {
        Ok(())
    } else {
        Err(OracleError::DimensionMismatch { expected, got: x.len() })
    }
}

/// Index of the largest finite entry, `None` if there is none.
pub(crate) fn argmax(values: ArrayView1<'_, f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}
