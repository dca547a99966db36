//! Critical point search along one-dimensional lines.
//!
//! Along `x(t) = origin + t·d` the directional derivative `g(t) = J(x(t))·d`
//! is piecewise constant: it changes exactly where some hidden unit's
//! pre-activation changes sign. The finder samples `g` on a coarse grid,
//! bisects every cell where it changes, and keeps a crossing only when the
//! Jacobian jump across it is rank 1, i.e. a single unit flipped.

use ndarray::{Array1, Array2, ArrayView1};
use tracing::trace;

use super::config::ExtractionConfig;
use super::error::SearchFailure;
use super::linalg::{norm, spectral_profile, unit};
use super::types::CriticalPoint;
use crate::oracle::{argmax, Oracle, OracleError};

/// Crossings walked inside one grid cell before moving on.
pub const MAX_CROSSINGS_PER_CELL: usize = 8;

/// Halving steps allowed per bisection; bounds work when the tolerance is
/// finer than the float spacing at the bracket.
const MAX_BISECTION_STEPS: usize = 200;

/// Everything one line search observed.
#[derive(Debug, Clone, Default)]
pub struct LineScan {
    /// Accepted crossings, ordered by offset
    pub points: Vec<CriticalPoint>,
    /// Offsets of rank ≥ 2 (simultaneous) crossings
    pub ambiguous: Vec<f64>,
    /// Crossings whose jump fell under the noise floor
    pub below_floor: usize,
    /// Oracle queries issued
    pub queries: usize,
}

enum Crossing {
    Accepted(CriticalPoint),
    Ambiguous(f64),
    BelowFloor,
}

struct Line<'a, 'o, O: Oracle + ?Sized> {
    oracle: &'a O,
    origin: ArrayView1<'o, f64>,
    direction: Array1<f64>,
    config: &'a ExtractionConfig,
    queries: usize,
}

impl<O: Oracle + ?Sized> Line<'_, '_, O> {
    fn at(&self, t: f64) -> Array1<f64> {
        &self.origin + &(&self.direction * t)
    }

    fn jacobian(&mut self, x: ArrayView1<'_, f64>) -> Result<Array2<f64>, OracleError> {
        self.queries += 1;
        self.oracle.jacobian(x)
    }

    fn slope(&mut self, t: f64) -> Result<Array1<f64>, OracleError> {
        let x = self.at(t);
        Ok(self.jacobian(x.view())?.dot(&self.direction))
    }

    fn changed(&self, a: &Array1<f64>, b: &Array1<f64>) -> bool {
        norm((a - b).view()) > self.config.noise_floor
    }

    /// Shrink `[lo, hi]` around a change of slope, keeping `g(lo) == g_lo`.
    fn bisect(
        &mut self,
        mut lo: f64,
        g_lo: &Array1<f64>,
        mut hi: f64,
        mut g_hi: Array1<f64>,
    ) -> Result<(f64, f64, Array1<f64>), OracleError> {
        let mut steps = 0;
        while hi - lo > self.config.position_tolerance && steps < MAX_BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            let g_mid = self.slope(mid)?;
            if self.changed(&g_mid, g_lo) {
                hi = mid;
                g_hi = g_mid;
            } else {
                lo = mid;
            }
            steps += 1;
        }
        Ok((lo, hi, g_hi))
    }

    /// Check the bracket `[lo, hi]` holds exactly one unit flip.
    fn classify(&mut self, lo: f64, hi: f64) -> Result<Crossing, OracleError> {
        let offset = 0.5 * (lo + hi);
        let eps = self.config.position_tolerance.max(hi - lo);
        let location = self.at(offset);
        let (x_before, x_after) = (self.at(offset - eps), self.at(offset + eps));
        let before = self.jacobian(x_before.view())?;
        let after = self.jacobian(x_after.view())?;
        let jump = &after - &before;

        let (s1, ratio) = spectral_profile(jump.view());
        if s1 <= self.config.noise_floor {
            trace!(offset, sigma = s1, "jump below noise floor");
            return Ok(Crossing::BelowFloor);
        }
        if ratio > self.config.rank_tolerance {
            trace!(offset, ratio, "simultaneous crossing");
            return Ok(Crossing::Ambiguous(offset));
        }

        self.queries += 1;
        let logits = self.oracle.output(location.view())?;
        let row_norm = |c: usize| norm(jump.row(c));
        let class_index = match argmax(logits.view()) {
            Some(c) if row_norm(c) > self.config.noise_floor => c,
            _ => (0..jump.nrows())
                .max_by(|&a, &b| row_norm(a).total_cmp(&row_norm(b)))
                .unwrap_or(0),
        };

        Ok(Crossing::Accepted(CriticalPoint {
            location,
            origin: self.origin.to_owned(),
            direction: self.direction.clone(),
            offset,
            class_index,
            gradient_jump: jump.row(class_index).to_owned(),
            jump_rank_ratio: ratio,
        }))
    }
}

/// Scan `origin + t·direction`, `t ∈ [0, search_bound]`, for every
/// single-unit crossing.
///
/// `direction` is normalised first; a zero direction yields an empty scan.
pub fn scan_line<O: Oracle + ?Sized>(
    oracle: &O,
    origin: ArrayView1<'_, f64>,
    direction: ArrayView1<'_, f64>,
    search_bound: f64,
    config: &ExtractionConfig,
) -> Result<LineScan, OracleError> {
    let mut scan = LineScan::default();
    let Some(direction) = unit(direction) else {
        return Ok(scan);
    };
    let mut line = Line { oracle, origin, direction, config, queries: 0 };

    let steps = config.grid_steps.max(1);
    let grid: Vec<f64> = (0..=steps).map(|i| search_bound * i as f64 / steps as f64).collect();
    let slopes = grid.iter().map(|&t| line.slope(t)).collect::<Result<Vec<_>, _>>()?;

    for k in 0..steps {
        if !line.changed(&slopes[k], &slopes[k + 1]) {
            continue;
        }
        let hi = grid[k + 1];
        let mut lo = grid[k];
        let mut g_lo = slopes[k].clone();
        for _ in 0..MAX_CROSSINGS_PER_CELL {
            let (a, b, g_b) = line.bisect(lo, &g_lo, hi, slopes[k + 1].clone())?;
            match line.classify(a, b)? {
                Crossing::Accepted(point) => scan.points.push(point),
                Crossing::Ambiguous(offset) => scan.ambiguous.push(offset),
                Crossing::BelowFloor => scan.below_floor += 1,
            }
            if b >= hi || !line.changed(&g_b, &slopes[k + 1]) {
                break;
            }
            lo = b;
            g_lo = g_b;
        }
    }

    scan.queries = line.queries;
    Ok(scan)
}

/// First single-unit crossing along the line.
///
/// Returns `Ambiguous` when the earliest crossing is a simultaneous flip of
/// several units, and `NotFound` when the directional derivative is constant
/// over the whole bound.
pub fn find<O: Oracle + ?Sized>(
    oracle: &O,
    origin: ArrayView1<'_, f64>,
    direction: ArrayView1<'_, f64>,
    search_bound: f64,
    config: &ExtractionConfig,
) -> Result<CriticalPoint, SearchFailure> {
    let scan = scan_line(oracle, origin, direction, search_bound, config)?;
    let first_ambiguous = scan.ambiguous.first().copied();
    match (scan.points.into_iter().next(), first_ambiguous) {
        (Some(point), Some(offset)) if offset < point.offset => {
            Err(SearchFailure::Ambiguous { offset })
        }
        (Some(point), _) => Ok(point),
        (None, Some(offset)) => Err(SearchFailure::Ambiguous { offset }),
        (None, None) => Err(SearchFailure::NotFound),
    }
}
