//! Functionally-equivalent extraction of two-layer ReLU classifiers.
//!
//! Given gradient access to `f(x) = W1 · relu(W0 · x + b0) + b1`, recovers
//! every parameter up to the symmetries no query can observe: hidden-unit
//! order and the positive scale of each unit (folded into `W1`, with `W0`
//! rows normalised to unit length).
//!
//! # Phases
//!
//! 1. **Searching**: line searches locate critical points, where a single
//!    unit's pre-activation crosses zero ([`scan_line`], [`find`])
//! 2. **Clustering**: critical points are grouped by the direction of their
//!    gradient jump, one group per unit ([`cluster`])
//! 3. **Direction solve**: each group's weight direction is the top
//!    singular vector of its stacked jumps ([`solve_direction`])
//! 4. **Calibrating**: sign from an activity probe, bias from the points on
//!    the hyperplane ([`calibrate`])
//! 5. **Output solve**: least squares on locally computed activations
//!    ([`solve_output_layer`])
//! 6. **Validating**: held-out comparison against the oracle ([`validate`])
//!
//! # Example
//!
//! ```
//! use extraer::extract::{extract, gaussian_pool, ExtractionConfig};
//! use extraer::oracle::ReluNetwork;
//!
//! let victim = ReluNetwork::random(5, 3, 2, 9);
//! let pool = gaussian_pool(32, 5, 0);
//! let model = extract(&victim, 3, pool.view(), ExtractionConfig::new()).unwrap();
//! assert_eq!(model.w0.shape(), &[3, 5]);
//! ```

pub mod calibrate;
pub mod cluster;
pub mod config;
pub mod direction;
pub mod engine;
pub mod error;
pub mod finder;
mod linalg;
pub mod matching;
pub mod output_layer;
mod sampling;
pub mod state;
pub mod types;
pub mod validate;


pub use calibrate::{calibrate, resolve_signs_by_fit, ProbeBasis, SignatureDraft, SIGN_FIT_TOLERANCE};
pub use cluster::{cluster, merge_collinear, ClusterOutcome};
pub use config::ExtractionConfig;
pub use direction::solve_direction;
pub use engine::{extract, Extractor};
pub use error::{CalibrationError, ExtractionError, Result, SearchFailure};
pub use finder::{find, scan_line, LineScan, MAX_CROSSINGS_PER_CELL};
pub use matching::{compare_models, match_neurons, ModelComparison, NeuronMatch};
pub use output_layer::{solve_output_layer, OutputLayer};
pub use sampling::gaussian_pool;
pub use state::{
    ExtractionDiagnostics, ExtractionPhase, ExtractionReport, ExtractionState, PhaseTransition,
    RejectionCounts,
};
pub use types::{CriticalPoint, ExtractedModel, NeuronCluster, NeuronSignature};
pub use validate::{validate, ValidationReport};
