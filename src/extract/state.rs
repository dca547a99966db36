//! Run-scoped state and diagnostics of the extraction engine.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::config::ExtractionConfig;
use super::types::{CriticalPoint, ExtractedModel, NeuronCluster, NeuronSignature};
use super::validate::ValidationReport;

/// Current phase of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExtractionPhase {
    /// Not started.
    #[default]
    Init,
    /// Running line searches for critical points.
    Searching,
    /// Grouping critical points by neuron.
    Clustering,
    /// Solving each neuron's weight direction.
    DirectionSolve,
    /// Fixing signs and biases.
    Calibrating,
    /// Solving the second layer.
    OutputSolve,
    /// Comparing against the oracle on held-out points.
    Validating,
    /// Extraction succeeded.
    Done,
    /// Extraction failed.
    Failed,
}

impl ExtractionPhase {
    /// Check if the run is in an active (non-terminal) phase.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExtractionPhase::Searching
                | ExtractionPhase::Clustering
                | ExtractionPhase::DirectionSolve
                | ExtractionPhase::Calibrating
                | ExtractionPhase::OutputSolve
                | ExtractionPhase::Validating
        )
    }

    /// Check if the run has finished (success or failure).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExtractionPhase::Done | ExtractionPhase::Failed)
    }

    /// Get display name for the phase.
    pub fn display_name(&self) -> &'static str {
        match self {
            ExtractionPhase::Init => "Init",
            ExtractionPhase::Searching => "Searching",
            ExtractionPhase::Clustering => "Clustering",
            ExtractionPhase::DirectionSolve => "Direction Solve",
            ExtractionPhase::Calibrating => "Calibrating",
            ExtractionPhase::OutputSolve => "Output Solve",
            ExtractionPhase::Validating => "Validating",
            ExtractionPhase::Done => "Done",
            ExtractionPhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One entry of the phase log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: ExtractionPhase,
    pub to: ExtractionPhase,
    /// Search round at the time of the transition
    pub round: usize,
    /// Seconds since the run started
    pub elapsed_secs: f64,
    pub note: String,
}

/// Candidates discarded before or during clustering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// Simultaneous crossings
    pub ambiguous: usize,
    /// Jumps under the noise floor
    pub below_floor: usize,
    /// Lines without any crossing
    pub empty_lines: usize,
    /// Points left out of every surviving cluster
    pub unclustered: usize,
}

/// Mutable state of a single run, owned by the `Extractor`.
///
/// Reset at the start of every run.
#[derive(Debug, Clone)]
pub struct ExtractionState {
    pub phase: ExtractionPhase,
    pub(crate) rng: StdRng,
    pub points: Vec<CriticalPoint>,
    pub clusters: Vec<NeuronCluster>,
    pub signatures: Vec<NeuronSignature>,
    /// Zero-based widen-and-retry round
    pub round: usize,
    /// Current search segment length
    pub bound: f64,
    /// Batches run in the current round
    pub round_batches: usize,
    /// Batches run over the whole run
    pub total_batches: usize,
    /// Line searches run over the whole run
    pub lines: usize,
    /// Oracle queries issued by line searches
    pub search_queries: usize,
    /// Neurons dropped by the unresolved-sign policy
    pub dropped: Vec<usize>,
    /// Sample draws spent on least-squares solves (sign fit and output layer)
    pub solve_attempts: usize,
    pub rejections: RejectionCounts,
    pub transitions: Vec<PhaseTransition>,
    pub validation: Option<ValidationReport>,
}

impl ExtractionState {
    /// Fresh state for a run of `config`.
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            phase: ExtractionPhase::Init,
            rng: StdRng::seed_from_u64(config.seed),
            points: Vec::new(),
            clusters: Vec::new(),
            signatures: Vec::new(),
            round: 0,
            bound: config.initial_search_bound,
            round_batches: 0,
            total_batches: 0,
            lines: 0,
            search_queries: 0,
            dropped: Vec::new(),
            solve_attempts: 0,
            rejections: RejectionCounts::default(),
            transitions: Vec::new(),
            validation: None,
        }
    }

    /// Snapshot of the state for reporting.
    pub fn diagnostics(&self) -> ExtractionDiagnostics {
        ExtractionDiagnostics {
            critical_points: self.points.clone(),
            clusters: self.clusters.clone(),
            signatures: self.signatures.clone(),
            validation: self.validation.clone(),
            rounds: self.round + 1,
            final_bound: self.bound,
            batches: self.total_batches,
            lines: self.lines,
            search_queries: self.search_queries,
            dropped: self.dropped.clone(),
            solve_attempts: self.solve_attempts,
            rejections: self.rejections,
            transitions: self.transitions.clone(),
        }
    }
}

/// What a run saw, for callers that want more than the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    pub critical_points: Vec<CriticalPoint>,
    pub clusters: Vec<NeuronCluster>,
    pub signatures: Vec<NeuronSignature>,
    pub validation: Option<ValidationReport>,
    /// Search rounds used (first round counts as one)
    pub rounds: usize,
    pub final_bound: f64,
    pub batches: usize,
    pub lines: usize,
    pub search_queries: usize,
    pub dropped: Vec<usize>,
    pub solve_attempts: usize,
    pub rejections: RejectionCounts,
    pub transitions: Vec<PhaseTransition>,
}

/// Successful run: the model plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub model: ExtractedModel,
    pub diagnostics: ExtractionDiagnostics,
}
