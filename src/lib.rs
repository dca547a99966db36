//! extraer: parameter extraction for two-layer ReLU classifiers
//!
//! Recovers `W0, b0, W1, b1` of `f(x) = W1 · relu(W0 · x + b0) + b1` from
//! black-box queries that return logits and their Jacobian. The recovered
//! model computes the same function as the victim; hidden-unit order and
//! per-unit positive scale are the only freedoms left.
//!
//! # Modules
//!
//! - [`oracle`]: the query capability and reference adapters
//! - [`extract`]: the attack phases and the engine driving them
//! - [`cli`]: command-line front end
//!
//! # Example
//!
//! ```
//! use extraer::extract::{compare_models, extract, gaussian_pool, ExtractionConfig};
//! use extraer::oracle::ReluNetwork;
//!
//! let victim = ReluNetwork::random(6, 4, 3, 2024);
//! let pool = gaussian_pool(32, 6, 7);
//! let model = extract(&victim, 4, pool.view(), ExtractionConfig::new()).unwrap();
//! assert!(compare_models(&model, &victim).within(1e-5));
//! ```

pub mod cli;
pub mod extract;
pub mod oracle;

pub use extract::{extract, ExtractedModel, ExtractionConfig, ExtractionError, Extractor};
pub use oracle::{Oracle, OracleError, ReluNetwork};
