//! Held-out comparison of an extracted model against the oracle.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::oracle::Oracle;

/// Outcome of comparing two models on a fixed point set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Max absolute logit error per point
    pub residuals: Vec<f64>,
    pub max_error: f64,
    pub mean_error: f64,
    /// Points with some component outside `tolerance · (1 + |actual|)`
    pub failed: usize,
    pub tolerance: f64,
    pub passed: bool,
}

impl ValidationReport {
    /// Number of points compared.
    pub fn total(&self) -> usize {
        self.residuals.len()
    }
}

/// `f64::max` that lets NaN through instead of discarding it.
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Compare `model` with `oracle` on every row of `points`.
///
/// Pure: the same inputs always give the same report. A NaN logit on
/// either side makes that point's residual and `max_error` NaN.
pub fn validate<M: Oracle + ?Sized, O: Oracle + ?Sized>(
    model: &M,
    oracle: &O,
    points: ArrayView2<'_, f64>,
    tolerance: f64,
) -> Result<ValidationReport> {
    let mut residuals = Vec::with_capacity(points.nrows());
    let mut failed = 0;
    for x in points.rows() {
        let predicted = model.output(x)?;
        let actual = oracle.output(x)?;
        let mut worst: f64 = 0.0;
        let mut ok = predicted.len() == actual.len();
        for (&p, &a) in predicted.iter().zip(actual.iter()) {
            let err = (p - a).abs();
            worst = nan_max(worst, err);
            if err.is_nan() || err > tolerance * (1.0 + a.abs()) {
                ok = false;
            }
        }
        if !ok {
            failed += 1;
        }
        residuals.push(worst);
    }

    let max_error = residuals.iter().copied().fold(0.0, nan_max);
    let mean_error = if residuals.is_empty() {
        0.0
    } else {
        residuals.iter().sum::<f64>() / residuals.len() as f64
    };
    Ok(ValidationReport {
        residuals,
        max_error,
        mean_error,
        failed,
        tolerance,
        passed: failed == 0,
    })
}
