//! Phase orchestration for one extraction run.

use std::time::Instant;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::calibrate::{calibrate, resolve_signs_by_fit, ProbeBasis, SignatureDraft};
use super::cluster::cluster;
use super::config::ExtractionConfig;
use super::direction::solve_direction;
use super::error::{CalibrationError, ExtractionError, Result};
use super::finder::{scan_line, LineScan};
use super::output_layer::{solve_output_layer, OutputLayer};
use super::sampling::{line_task, perturbed_samples};
use super::state::{ExtractionPhase, ExtractionReport, ExtractionState, PhaseTransition};
use super::types::ExtractedModel;
use super::validate::validate;
use crate::oracle::{Oracle, OracleError};

/// Drives the attack against one oracle.
///
/// # Example
///
/// ```
/// use extraer::extract::{gaussian_pool, ExtractionConfig, Extractor};
/// use extraer::oracle::ReluNetwork;
///
/// let victim = ReluNetwork::random(6, 3, 2, 42);
/// let pool = gaussian_pool(32, 6, 1);
/// let mut extractor = Extractor::new(&victim, 3, pool, ExtractionConfig::new()).unwrap();
/// let report = extractor.run().unwrap();
/// assert_eq!(report.model.hidden_width(), 3);
/// ```
pub struct Extractor<O: Oracle> {
    oracle: O,
    hidden_width: usize,
    pool: Array2<f64>,
    config: ExtractionConfig,
    state: ExtractionState,
    started: Instant,
}

impl<O: Oracle> Extractor<O> {
    /// Check inputs and prepare a run.
    pub fn new(
        oracle: O,
        hidden_width: usize,
        sample_pool: Array2<f64>,
        config: ExtractionConfig,
    ) -> Result<Self> {
        config.validate()?;
        if hidden_width == 0 {
            return Err(ExtractionError::InvalidConfig("hidden_width must be at least 1".to_string()));
        }
        if oracle.input_dim() == 0 || oracle.output_dim() == 0 {
            return Err(ExtractionError::InvalidConfig(format!(
                "oracle dimensions must be non-zero, got {}x{}",
                oracle.output_dim(),
                oracle.input_dim()
            )));
        }
        if sample_pool.nrows() == 0 {
            return Err(ExtractionError::EmptySamplePool);
        }
        if sample_pool.ncols() != oracle.input_dim() {
            return Err(ExtractionError::ShapeMismatch {
                expected: vec![sample_pool.nrows(), oracle.input_dim()],
                got: sample_pool.shape().to_vec(),
            });
        }
        if config.sample_budget <= hidden_width {
            return Err(ExtractionError::InvalidConfig(format!(
                "sample_budget ({}) must exceed hidden_width ({hidden_width})",
                config.sample_budget
            )));
        }
        let state = ExtractionState::new(&config);
        Ok(Self { oracle, hidden_width, pool: sample_pool, config, state, started: Instant::now() })
    }

    /// State of the current or most recent run.
    pub fn state(&self) -> &ExtractionState {
        &self.state
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Borrow the oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Run every phase from scratch.
    pub fn run(&mut self) -> Result<ExtractionReport> {
        self.state = ExtractionState::new(&self.config);
        self.started = Instant::now();
        info!(
            hidden_width = self.hidden_width,
            input_dim = self.oracle.input_dim(),
            output_dim = self.oracle.output_dim(),
            seed = self.config.seed,
            "starting extraction"
        );

        match self.run_phases() {
            Ok(model) => {
                self.transition(ExtractionPhase::Done, "extraction complete");
                Ok(ExtractionReport { model, diagnostics: self.state.diagnostics() })
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "extraction failed");
                self.transition(ExtractionPhase::Failed, err.to_string());
                Err(err)
            }
        }
    }

    fn run_phases(&mut self) -> Result<ExtractedModel> {
        self.search_until_clustered()?;
        let drafts = self.solve_directions()?;
        self.calibrate_all(&drafts)?;
        let layer = self.solve_output()?;
        let model = ExtractedModel::from_signatures(&self.state.signatures, layer.w1, layer.b1)?;
        self.validate_model(&model)?;
        Ok(model)
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn check_timeout(&self) -> Result<()> {
        match self.config.timeout_secs {
            Some(limit) if self.elapsed_secs() > limit => Err(ExtractionError::Timeout {
                elapsed_secs: self.elapsed_secs(),
                limit_secs: limit,
            }),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, to: ExtractionPhase, note: impl Into<String>) {
        let from = self.state.phase;
        let note = note.into();
        info!(from = %from, to = %to, round = self.state.round, "{note}");
        self.state.transitions.push(PhaseTransition {
            from,
            to,
            round: self.state.round,
            elapsed_secs: self.elapsed_secs(),
            note,
        });
        self.state.phase = to;
    }

    /// Widen the bound for another round, or fail with `exhausted` once the
    /// retry cap is spent.
    fn widen_or_fail(&mut self, exhausted: ExtractionError) -> Result<()> {
        if self.state.round >= self.config.retry_cap {
            return Err(exhausted);
        }
        self.state.round += 1;
        self.state.round_batches = 0;
        self.state.bound *= self.config.bound_growth;
        debug!(round = self.state.round, bound = self.state.bound, "widening search bound");
        Ok(())
    }

    fn search_until_clustered(&mut self) -> Result<()> {
        loop {
            self.check_timeout()?;
            self.transition(
                ExtractionPhase::Searching,
                format!("searching with bound {:.3}", self.state.bound),
            );
            let required = self.config.points_per_neuron * self.hidden_width * (self.state.round + 1);
            self.run_batch()?;
            while self.state.points.len() < required
                && self.state.round_batches < self.config.max_batches_per_round
            {
                self.check_timeout()?;
                self.run_batch()?;
            }

            let found = self.state.points.len();
            if found < required {
                let rounds = self.state.round + 1;
                self.widen_or_fail(ExtractionError::InsufficientCriticalPoints {
                    found,
                    required,
                    rounds,
                })?;
                continue;
            }

            self.check_timeout()?;
            self.transition(ExtractionPhase::Clustering, format!("clustering {found} critical points"));
            let outcome = cluster(&self.state.points, &self.config);
            self.state.rejections.unclustered = outcome.discarded + outcome.skipped;
            debug!(
                clusters = outcome.count(),
                discarded = outcome.discarded,
                skipped = outcome.skipped,
                "clustering finished"
            );
            let count = outcome.count();
            self.state.clusters = outcome.clusters;
            if count == self.hidden_width {
                return Ok(());
            }

            let rounds = self.state.round + 1;
            self.widen_or_fail(ExtractionError::ClusterCountMismatch {
                expected: self.hidden_width,
                found: count,
                rounds,
            })?;
        }
    }

    /// One batch of independent line searches, merged in task order.
    fn run_batch(&mut self) -> Result<()> {
        let batch_seed: u64 = self.state.rng.random();
        let bound = self.state.bound;
        let lines = self.config.lines_per_batch;
        let oracle = &self.oracle;
        let pool = self.pool.view();
        let config = &self.config;

        let scan = |i: usize| -> std::result::Result<LineScan, OracleError> {
            let mut rng = StdRng::seed_from_u64(batch_seed.wrapping_add(i as u64));
            let task = line_task(&mut rng, pool, bound);
            scan_line(oracle, task.origin.view(), task.direction.view(), task.bound, config)
        };
        let scans: Vec<_> = if config.parallel {
            (0..lines).into_par_iter().map(scan).collect()
        } else {
            (0..lines).map(scan).collect()
        };

        let before = self.state.points.len();
        for result in scans {
            let line = result?;
            let rejections = &mut self.state.rejections;
            rejections.ambiguous += line.ambiguous.len();
            rejections.below_floor += line.below_floor;
            if line.points.is_empty() {
                rejections.empty_lines += 1;
            }
            self.state.search_queries += line.queries;
            self.state.points.extend(line.points);
        }
        self.state.lines += lines;
        self.state.round_batches += 1;
        self.state.total_batches += 1;

        debug!(
            round = self.state.round,
            batch = self.state.round_batches,
            accepted = self.state.points.len() - before,
            total = self.state.points.len(),
            "line batch finished"
        );
        Ok(())
    }

    fn solve_directions(&mut self) -> Result<Vec<SignatureDraft>> {
        self.check_timeout()?;
        self.transition(
            ExtractionPhase::DirectionSolve,
            format!("solving {} weight directions", self.state.clusters.len()),
        );
        self.state
            .clusters
            .iter()
            .enumerate()
            .map(|(i, c)| -> Result<SignatureDraft> {
                Ok(SignatureDraft {
                    neuron: i,
                    direction: solve_direction(c, &self.state.points)?,
                    cluster: i,
                })
            })
            .collect()
    }

    fn calibrate_all(&mut self, drafts: &[SignatureDraft]) -> Result<()> {
        self.check_timeout()?;
        self.transition(ExtractionPhase::Calibrating, "resolving signs and biases");
        let basis = ProbeBasis::new(drafts, self.config.rank_tolerance)?;
        if !basis.is_complete() {
            debug!(rank = basis.rank(), width = basis.width(), "probe basis incomplete, fitting signs");
            let required = drafts.len() + self.oracle.input_dim() + 1;
            self.state.signatures = self.with_resampling(required, |this, samples| {
                let state = &this.state;
                resolve_signs_by_fit(drafts, &state.clusters, &state.points, &this.oracle, samples, &this.config)
            })?;
            return Ok(());
        }

        let mut signatures = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let cluster = &self.state.clusters[draft.cluster];
            match calibrate(draft, cluster, &self.state.points, &self.oracle, &basis, &self.config) {
                Ok(signature) => signatures.push(signature),
                Err(CalibrationError::Unresolved { neuron, attempts }) if self.config.drop_unresolved => {
                    warn!(neuron, attempts, "dropping neuron with unresolved sign");
                    self.state.dropped.push(neuron);
                }
                Err(err) => return Err(err.into()),
            }
        }
        if signatures.is_empty() {
            let neuron = self.state.dropped.first().copied().unwrap_or(0);
            return Err(ExtractionError::UnresolvedSign {
                neuron,
                attempts: self.config.probe_retries + 1,
            });
        }
        self.state.signatures = signatures;
        Ok(())
    }

    /// Run `solve` on fresh samples, doubling the spread after each
    /// rank-deficient attempt.
    fn with_resampling<T>(
        &mut self,
        required: usize,
        solve: impl Fn(&Self, ArrayView2<'_, f64>) -> Result<T>,
    ) -> Result<T> {
        let attempts = self.config.output_solve_retries + 1;
        let mut spread = self.config.sample_spread;
        let mut last_rank = 0;
        for attempt in 1..=attempts {
            let samples = self.draw_samples(self.config.sample_budget, spread);
            self.state.solve_attempts += 1;
            match solve(self, samples.view()) {
                Ok(solved) => {
                    debug!(attempt, spread, "linear solve succeeded");
                    return Ok(solved);
                }
                Err(ExtractionError::RankDeficientSolve { rank, .. }) => {
                    debug!(rank, attempt, spread, "resampling rank-deficient design");
                    last_rank = rank;
                    spread = if spread > 0.0 { spread * 2.0 } else { 1.0 };
                }
                Err(err) => return Err(err),
            }
            self.check_timeout()?;
        }
        Err(ExtractionError::RankDeficientSolve { rank: last_rank, required, attempts })
    }

    /// Points the output solve and validation sample around: pool rows
    /// interleaved with critical point locations.
    fn anchors(&self) -> Vec<ArrayView1<'_, f64>> {
        let pool = self.pool.rows().into_iter();
        let mut located = self.state.points.iter().map(|p| p.location.view());
        let mut anchors = Vec::with_capacity(self.pool.nrows() + self.state.points.len());
        for row in pool {
            anchors.push(row);
            if let Some(loc) = located.next() {
                anchors.push(loc);
            }
        }
        anchors.extend(located);
        anchors
    }

    fn draw_samples(&mut self, count: usize, spread: f64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(self.state.rng.random());
        perturbed_samples(&mut rng, &self.anchors(), count, spread)
    }

    fn solve_output(&mut self) -> Result<OutputLayer> {
        self.check_timeout()?;
        self.transition(ExtractionPhase::OutputSolve, "solving output layer");
        let layer = self.with_resampling(self.state.signatures.len() + 1, |this, samples| {
            solve_output_layer(&this.state.signatures, &this.oracle, samples, this.config.rank_tolerance)
        })?;
        debug!(rank = layer.rank, "output layer solved");
        Ok(layer)
    }

    fn validate_model(&mut self, model: &ExtractedModel) -> Result<()> {
        self.check_timeout()?;
        self.transition(
            ExtractionPhase::Validating,
            format!("validating on {} held-out points", self.config.validation_samples),
        );
        let held_out = self.draw_samples(self.config.validation_samples, self.config.sample_spread);
        let report = validate(model, &self.oracle, held_out.view(), self.config.validation_tolerance)?;
        info!(
            max_error = report.max_error,
            mean_error = report.mean_error,
            failed = report.failed,
            "validation finished"
        );
        let outcome = if report.passed {
            Ok(())
        } else {
            Err(ExtractionError::ValidationMismatch {
                max_error: report.max_error,
                tolerance: report.tolerance,
                failed: report.failed,
                total: report.total(),
            })
        };
        self.state.validation = Some(report);
        outcome
    }
}

/// Run a full extraction and return only the model.
///
/// `sample_pool` holds representative inputs, one per row.
pub fn extract<O: Oracle>(
    oracle: O,
    hidden_width: usize,
    sample_pool: ArrayView2<'_, f64>,
    config: ExtractionConfig,
) -> Result<ExtractedModel> {
    let mut extractor = Extractor::new(oracle, hidden_width, sample_pool.to_owned(), config)?;
    Ok(extractor.run()?.model)
}
