//! Query accounting around an oracle.

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::error::OracleResult;
use super::Oracle;

/// Number of queries issued against an oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCounts {
    /// Forward passes.
    pub outputs: usize,
    /// Jacobian evaluations.
    pub jacobians: usize,
}

impl QueryCounts {
    /// Total number of queries of either kind.
    pub fn total(&self) -> usize {
        self.outputs + self.jacobians
    }
}

/// Wraps an oracle and counts every query made through it.
///
/// Counters are atomic so the wrapper can be shared across parallel line
/// searches.
#[derive(Debug)]
pub struct CountingOracle<O> {
    inner: O,
    outputs: AtomicUsize,
    jacobians: AtomicUsize,
}

impl<O: Oracle> CountingOracle<O> {
    /// Wrap an oracle with zeroed counters.
    pub fn new(inner: O) -> Self {
        Self { inner, outputs: AtomicUsize::new(0), jacobians: AtomicUsize::new(0) }
    }

    /// Snapshot of the counters.
    pub fn counts(&self) -> QueryCounts {
        QueryCounts {
            outputs: self.outputs.load(Ordering::Relaxed),
            jacobians: self.jacobians.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters.
    pub fn reset(&self) {
        self.outputs.store(0, Ordering::Relaxed);
        self.jacobians.store(0, Ordering::Relaxed);
    }

    /// Borrow the wrapped oracle.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwrap the oracle.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Oracle> Oracle for CountingOracle<O> {
    fn input_dim(&self) -> usize {
        self.inner.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.inner.output_dim()
    }

    fn output(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array1<f64>> {
        self.outputs.fetch_add(1, Ordering::Relaxed);
        self.inner.output(x)
    }

    fn jacobian(&self, x: ArrayView1<'_, f64>) -> OracleResult<Array2<f64>> {
        self.jacobians.fetch_add(1, Ordering::Relaxed);
        self.inner.jacobian(x)
    }
}
