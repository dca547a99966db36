//! Error types for oracle adapters.

use thiserror::Error;

/// Oracle errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("Input dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Parameter shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch { what: &'static str, expected: Vec<usize>, got: Vec<usize> },

    #[error("Class index {index} out of range for {classes} classes")]
    ClassOutOfRange { index: usize, classes: usize },

    #[error("Oracle returned a non-finite {query}")]
    NonFinite { query: &'static str },

    #[error("Oracle backend error: {0}")]
    Backend(String),
}

/// Result type for oracle queries
pub type OracleResult<T> = std::result::Result<T, OracleError>;
