//! Error types for the extraction attack.

use thiserror::Error;

use crate::oracle::OracleError;

/// Extraction errors
///
/// Structural failures (`ClusterCountMismatch`, `ValidationMismatch`) end the
/// run; they are never degraded into a plausible-looking wrong model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error(
        "Insufficient critical points: found {found}, required {required} after {rounds} round(s)"
    )]
    InsufficientCriticalPoints { found: usize, required: usize, rounds: usize },

    #[error("Cluster count mismatch: expected {expected} neurons, found {found} after {rounds} round(s)")]
    ClusterCountMismatch { expected: usize, found: usize, rounds: usize },

    #[error("Unresolved sign for neuron {neuron} after {attempts} probe attempt(s)")]
    UnresolvedSign { neuron: usize, attempts: usize },

    #[error("Rank-deficient output-layer solve: rank {rank} < {required} after {attempts} attempt(s)")]
    RankDeficientSolve { rank: usize, required: usize, attempts: usize },

    #[error(
        "Validation mismatch: {failed}/{total} held-out points exceed tolerance {tolerance:e} (max error {max_error:e})"
    )]
    ValidationMismatch { max_error: f64, tolerance: f64, failed: usize, total: usize },

    #[error("Extraction timed out after {elapsed_secs:.1}s (limit {limit_secs:.1}s)")]
    Timeout { elapsed_secs: f64, limit_secs: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("Sample pool is empty")]
    EmptySamplePool,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Linear algebra failure: {0}")]
    Linalg(String),
}

impl ExtractionError {
    /// Whether a larger search budget or a different seed could plausibly
    /// turn this failure into a success.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCriticalPoints { .. }
                | Self::UnresolvedSign { .. }
                | Self::RankDeficientSolve { .. }
                | Self::Timeout { .. }
        )
    }

    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientCriticalPoints { .. } => "insufficient_critical_points",
            Self::ClusterCountMismatch { .. } => "cluster_count_mismatch",
            Self::UnresolvedSign { .. } => "unresolved_sign",
            Self::RankDeficientSolve { .. } => "rank_deficient_solve",
            Self::ValidationMismatch { .. } => "validation_mismatch",
            Self::Timeout { .. } => "timeout",
            Self::InvalidConfig(_) => "invalid_config",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::EmptySamplePool => "empty_sample_pool",
            Self::Oracle(_) => "oracle",
            Self::Linalg(_) => "linalg",
        }
    }
}

/// Why a single line search produced no critical point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchFailure {
    #[error("No activation boundary within the search bound")]
    NotFound,

    #[error("Simultaneous boundary crossing at offset {offset}")]
    Ambiguous { offset: f64 },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Why a neuron's sign could not be fixed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Neuron {neuron}: no probe separated an active from an inactive side after {attempts} attempt(s)")]
    Unresolved { neuron: usize, attempts: usize },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl From<CalibrationError> for ExtractionError {
    fn from(err: CalibrationError) -> Self {
        match err {
            CalibrationError::Unresolved { neuron, attempts } => {
                Self::UnresolvedSign { neuron, attempts }
            }
            CalibrationError::Oracle(e) => Self::Oracle(e),
        }
    }
}

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractionError>;
