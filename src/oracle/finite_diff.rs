//! Jacobians estimated by central differences over forward passes.

use ndarray::{Array1, Array2, ArrayView1};

use super::error::{OracleError, OracleResult};
use super::{check_input, Oracle};

/// Oracle adapter for victims that only expose forward passes.
///
/// Column `j` of the Jacobian is `(f(x + h·e_j) − f(x − h·e_j)) / 2h`, which
/// costs `2 · input_dim` forward passes per Jacobian. Within `h` of a ReLU
/// boundary the estimate blends both sides, so extraction tolerances must be
/// scaled to the step (see `ExtractionConfig::for_finite_differences`).
#[derive(Debug, Clone)]
pub struct FiniteDifferenceOracle<O> {
    inner: O,
    step: f64,
}

impl<O: Oracle> FiniteDifferenceOracle<O> {
    /// Wrap an oracle; `step` must be positive and finite.
    pub fn new(inner: O, step: f64) -> OracleResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(OracleError::Backend(format!(
                "finite-difference step must be positive, got {step}"
            )));
        }
        Ok(Self { inner, step })
    }

    /// Difference step `h`.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Borrow the wrapped oracle.
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Oracle> Oracle for FiniteDifferenceOracle<O> {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.inner.output_dim()
    }

    fn output(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array1<f64>> {
        self.inner.output(x)
    }

    fn jacobian(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array2<f64>> {
        let n = self.input_dim();
        check_input(n, x)?;

        let mut jacobian = Array2::zeros((self.output_dim(), n));
        let mut probe = x.to_owned();
        for j in 0..n {
            let original = probe[j];
            probe[j] = original + self.step;
            let plus = self.inner.output(probe.view())?;
            probe[j] = original - self.step;
            let minus = self.inner.output(probe.view())?;
            probe[j] = original;

            let column = (plus - minus) / (2.0 * self.step);
            if column.iter().any(|v| !v.is_finite()) {
                return Err(OracleError::NonFinite { query: "jacobian" });
            }
            jacobian.column_mut(j).assign(&column);
        }
        Ok(jacobian)
    }
}
