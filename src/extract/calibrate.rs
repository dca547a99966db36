//! Sign and bias recovery for each neuron.
//!
//! With the weight direction `u` known up to sign, the neuron is
//! `relu(λ·s·(u·x) + β)` for unknown `λ > 0`, `s ∈ {±1}`. The scale `λ` is
//! folded into the output layer; `s` is recovered by probing which side of
//! the hyperplane the neuron is active on; the bias follows from the
//! critical points lying on the hyperplane.
//!
//! Gradients alone cannot see a single neuron's activity directly, but the
//! Jacobian at any point is `J = A·U` with `U` the stacked recovered
//! directions and `A` the gated, scaled output weights. Right-multiplying by
//! `U⁺` recovers `A`, whose column `i` vanishes exactly when neuron `i` is
//! inactive.
//!
//! That split needs `U` to have full row rank, which fails once the layer is
//! wider than the input. [`resolve_signs_by_fit`] covers that case: since
//! `relu(-z) = relu(z) - z`, a flipped neuron shows up as a linear term in
//! the logits, and fitting `[relu(z) | x | 1]` exposes which neurons carry one.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::config::ExtractionConfig;
use super::error::{CalibrationError, ExtractionError, Result};
use super::linalg::{least_squares, norm, numerical_rank, pseudo_inverse};
use super::types::{CriticalPoint, NeuronCluster, NeuronSignature};
use crate::oracle::{Oracle, OracleResult};

/// A neuron with a known direction but unknown sign and bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureDraft {
    /// Position of the neuron in the recovered layer
    pub neuron: usize,
    /// Unit direction with arbitrary sign
    pub direction: Array1<f64>,
    /// Index of the source cluster
    pub cluster: usize,
}

/// Pseudo-inverse of the recovered direction matrix, used to split a
/// Jacobian into per-neuron contributions.
#[derive(Debug, Clone)]
pub struct ProbeBasis {
    pinv: Array2<f64>,
    rank: usize,
}

impl ProbeBasis {
    /// Build the basis from every draft's direction (rows of `U`).
    pub fn new(drafts: &[SignatureDraft], rank_tolerance: f64) -> Result<Self> {
        let dim = drafts.first().map_or(0, |d| d.direction.len());
        if drafts.is_empty() || dim == 0 {
            return Err(ExtractionError::Linalg("probe basis needs at least one direction".to_string()));
        }
        let mut u = Array2::zeros((drafts.len(), dim));
        for (mut row, draft) in u.rows_mut().into_iter().zip(drafts) {
            if draft.direction.len() != dim {
                return Err(ExtractionError::ShapeMismatch {
                    expected: vec![dim],
                    got: vec![draft.direction.len()],
                });
            }
            row.assign(&draft.direction);
        }
        let pinv = pseudo_inverse(u.view(), rank_tolerance)?;
        let rank = numerical_rank(u.view(), rank_tolerance);
        Ok(Self { pinv, rank })
    }

    /// Number of neurons covered.
    pub fn width(&self) -> usize {
        self.pinv.ncols()
    }

    /// Numerical rank of the direction matrix.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether every neuron's activity can be isolated, i.e. `U` has full
    /// row rank.
    pub fn is_complete(&self) -> bool {
        self.rank == self.width()
    }

    /// `J(p) · U⁺`, shape `(output_dim, width)`.
    pub fn contributions<O: Oracle + ?Sized>(
        &self,
        oracle: &O,
        p: ArrayView1<'_, f64>,
    ) -> OracleResult<Array2<f64>> {
        Ok(oracle.jacobian(p)?.dot(&self.pinv))
    }

    /// Column norms of the contribution matrix at `p`.
    pub fn activity<O: Oracle + ?Sized>(
        &self,
        oracle: &O,
        p: ArrayView1<'_, f64>,
    ) -> OracleResult<Array1<f64>> {
        let c = self.contributions(oracle, p)?;
        Ok(c.columns().into_iter().map(norm).collect())
    }
}

/// Fix the sign and bias of one drafted neuron.
pub fn calibrate<O: Oracle + ?Sized>(
    draft: &SignatureDraft,
    cluster: &NeuronCluster,
    points: &[CriticalPoint],
    oracle: &O,
    basis: &ProbeBasis,
    config: &ExtractionConfig,
) -> std::result::Result<NeuronSignature, CalibrationError> {
    let members: Vec<&CriticalPoint> = cluster.members.iter().filter_map(|&i| points.get(i)).collect();
    let unresolved = |attempts| CalibrationError::Unresolved { neuron: draft.neuron, attempts };
    if members.is_empty() {
        return Err(unresolved(0));
    }

    let u = &draft.direction;
    let mut margin = config.probe_margin;
    let mut sign = None;
    let mut attempts = 0;
    for attempt in 0..=config.probe_retries {
        attempts = attempt + 1;
        let x = &members[attempt % members.len()].location;
        let plus = x + &(u * margin);
        let minus = x - &(u * margin);
        let active_plus = is_active(basis, oracle, plus.view(), draft.neuron, config)?;
        let active_minus = is_active(basis, oracle, minus.view(), draft.neuron, config)?;
        trace!(neuron = draft.neuron, attempt, margin, active_plus, active_minus, "sign probe");
        match (active_plus, active_minus) {
            (true, false) => {
                sign = Some(1.0);
                break;
            }
            (false, true) => {
                sign = Some(-1.0);
                break;
            }
            _ => margin *= 2.0,
        }
    }
    let sign = sign.ok_or_else(|| unresolved(attempts))?;

    let weights = u * sign;
    let (bias, boundary_residual) = boundary_fit(&weights, &members);

    debug!(
        neuron = draft.neuron,
        sign,
        bias,
        residual = boundary_residual,
        attempts,
        "neuron calibrated"
    );

    Ok(NeuronSignature {
        weights,
        bias,
        cluster: draft.cluster,
        boundary_residual,
        probe_attempts: attempts,
    })
}

fn is_active<O: Oracle + ?Sized>(
    basis: &ProbeBasis,
    oracle: &O,
    p: ArrayView1<'_, f64>,
    neuron: usize,
    config: &ExtractionConfig,
) -> OracleResult<bool> {
    let activity = basis.activity(oracle, p)?;
    Ok(activity.get(neuron).is_some_and(|&a| a > config.noise_floor))
}

/// Bias putting the members on `w·x + b = 0`, and the worst residual.
fn boundary_fit(weights: &Array1<f64>, members: &[&CriticalPoint]) -> (f64, f64) {
    let projections: Vec<f64> = members.iter().map(|p| weights.dot(&p.location)).collect();
    let bias = -projections.iter().sum::<f64>() / projections.len().max(1) as f64;
    let residual = projections.iter().map(|z| (z + bias).abs()).fold(0.0, f64::max);
    (bias, residual)
}

/// Indicators further than this from 0 or 1 leave the sign undecided.
pub const SIGN_FIT_TOLERANCE: f64 = 0.25;

/// Fix every sign at once from a least-squares fit over `samples`.
///
/// With `z_i = u_i·x + β_i` on the drafted (arbitrary-sign) hyperplanes, the
/// logits are exactly `Σ α_i relu(z_i) + G·x + c` where
/// `G = -Σ_{flipped} α_i u_iᵀ`. Fitting that design gives `α` and `G`; the
/// flip indicators then solve a linear system with one column `vec(α_i u_iᵀ)`
/// per neuron. Works for any layer width as long as those columns are
/// independent (`k ≤ m·n` generically). Signatures resolved this way report
/// `probe_attempts == 0`.
///
/// Fails with `RankDeficientSolve` when either system is rank-deficient and
/// with `UnresolvedSign` when an indicator is not near 0 or 1.
pub fn resolve_signs_by_fit<O: Oracle + ?Sized>(
    drafts: &[SignatureDraft],
    clusters: &[NeuronCluster],
    points: &[CriticalPoint],
    oracle: &O,
    samples: ArrayView2<'_, f64>,
    config: &ExtractionConfig,
) -> Result<Vec<NeuronSignature>> {
    let k = drafts.len();
    let n = samples.ncols();
    let m = oracle.output_dim();
    if k == 0 {
        return Err(ExtractionError::Linalg("sign fit without hidden neurons".to_string()));
    }

    let mut planes = Vec::with_capacity(k);
    for draft in drafts {
        if draft.direction.len() != n {
            return Err(ExtractionError::ShapeMismatch {
                expected: vec![n],
                got: vec![draft.direction.len()],
            });
        }
        let members: Vec<&CriticalPoint> = clusters
            .get(draft.cluster)
            .map(|c| c.members.iter().filter_map(|&i| points.get(i)).collect())
            .unwrap_or_default();
        if members.is_empty() {
            return Err(ExtractionError::UnresolvedSign { neuron: draft.neuron, attempts: 0 });
        }
        planes.push(boundary_fit(&draft.direction, &members));
    }

    let cols = k + n + 1;
    let mut design = Array2::ones((samples.nrows(), cols));
    let mut targets = Array2::zeros((samples.nrows(), m));
    for (r, x) in samples.rows().into_iter().enumerate() {
        for (i, (draft, &(bias, _))) in drafts.iter().zip(&planes).enumerate() {
            design[[r, i]] = (draft.direction.dot(&x) + bias).max(0.0);
        }
        design.slice_mut(s![r, k..k + n]).assign(&x);
        targets.row_mut(r).assign(&oracle.output(x)?);
    }
    let rank = numerical_rank(design.view(), config.rank_tolerance);
    if rank < cols {
        debug!(rank, required = cols, "sign-fit design rank-deficient");
        return Err(ExtractionError::RankDeficientSolve { rank, required: cols, attempts: 1 });
    }
    let theta = least_squares(design.view(), targets.view(), config.rank_tolerance)?;

    // Row c·n + j holds output c, input j.
    let mut system = Array2::zeros((m * n, k));
    let mut rhs = Array2::zeros((m * n, 1));
    for c in 0..m {
        for j in 0..n {
            for (i, draft) in drafts.iter().enumerate() {
                system[[c * n + j, i]] = theta[[i, c]] * draft.direction[j];
            }
            rhs[[c * n + j, 0]] = -theta[[k + j, c]];
        }
    }
    let system_rank = numerical_rank(system.view(), config.rank_tolerance);
    if system_rank < k {
        debug!(rank = system_rank, required = k, "sign indicators not identifiable");
        return Err(ExtractionError::RankDeficientSolve { rank: system_rank, required: k, attempts: 1 });
    }
    let flips = least_squares(system.view(), rhs.view(), config.rank_tolerance)?;

    let mut signatures = Vec::with_capacity(k);
    for ((draft, &(bias, residual)), &flip) in drafts.iter().zip(&planes).zip(flips.column(0)) {
        let sign = if (flip - 1.0).abs() <= SIGN_FIT_TOLERANCE {
            -1.0
        } else if flip.abs() <= SIGN_FIT_TOLERANCE {
            1.0
        } else {
            return Err(ExtractionError::UnresolvedSign { neuron: draft.neuron, attempts: 0 });
        };
        trace!(neuron = draft.neuron, flip, sign, "sign fitted");
        signatures.push(NeuronSignature {
            weights: &draft.direction * sign,
            bias: bias * sign,
            cluster: draft.cluster,
            boundary_residual: residual,
            probe_attempts: 0,
        });
    }
    debug!(neurons = k, "signs resolved by fit");
    Ok(signatures)
}
