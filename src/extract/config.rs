//! Configuration for the extraction attack.

use std::f64::consts::FRAC_PI_2;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ExtractionError, Result};

/// Knobs for one extraction run.
///
/// Every floating-point comparison made by the attack goes through one of
/// these tolerances; nothing is compared for exact equality.
///
/// # Example
///
/// ```
/// use extraer::extract::ExtractionConfig;
///
/// let config = ExtractionConfig::new()
///     .with_seed(7)
///     .with_angular_tolerance(0.01)
///     .with_retry_cap(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Seed driving every random draw of the run
    pub seed: u64,
    /// Clustering merge threshold, as an angle in radians
    pub angular_tolerance: f64,
    /// Bisection stops once the bracket is at most this wide
    pub position_tolerance: f64,
    /// Minimum gradient jump (and per-neuron activity) treated as signal
    pub noise_floor: f64,
    /// Maximum widen-and-retry rounds after the first
    pub retry_cap: usize,
    /// Points drawn for the output-layer solve
    pub sample_budget: usize,
    /// Relative output mismatch allowed during validation
    pub validation_tolerance: f64,
    /// Length of each line segment searched in the first round
    pub initial_search_bound: f64,
    /// Factor applied to the search bound on each retry round
    pub bound_growth: f64,
    /// Coarse grid cells per line search
    pub grid_steps: usize,
    /// Independent line searches per batch
    pub lines_per_batch: usize,
    /// Batches allowed per search round
    pub max_batches_per_round: usize,
    /// Target accepted critical points per declared neuron
    pub points_per_neuron: usize,
    /// Clusters smaller than this are discarded
    pub min_cluster_size: usize,
    /// Singular value ratio below which a matrix counts as rank-deficient
    pub rank_tolerance: f64,
    /// Initial distance of the sign probe from the hyperplane
    pub probe_margin: f64,
    /// Additional sign probes before a neuron is declared unresolved
    pub probe_retries: usize,
    /// Drop unresolved neurons instead of failing the run
    pub drop_unresolved: bool,
    /// Resampling attempts for a rank-deficient output solve
    pub output_solve_retries: usize,
    /// Gaussian perturbation scale when sampling around known points
    pub sample_spread: f64,
    /// Held-out points used by validation
    pub validation_samples: usize,
    /// Run line searches of a batch on the rayon pool
    pub parallel: bool,
    /// Wall-clock limit for the whole run
    pub timeout_secs: Option<f64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            seed: 1234,
            angular_tolerance: 0.02,
            position_tolerance: 1e-8,
            noise_floor: 1e-6,
            retry_cap: 4,
            sample_budget: 256,
            validation_tolerance: 1e-4,
            initial_search_bound: 20.0,
            bound_growth: 2.0,
            grid_steps: 64,
            lines_per_batch: 8,
            max_batches_per_round: 16,
            points_per_neuron: 3,
            min_cluster_size: 2,
            rank_tolerance: 1e-6,
            probe_margin: 1e-2,
            probe_retries: 3,
            drop_unresolved: false,
            output_solve_retries: 3,
            sample_spread: 1.0,
            validation_samples: 64,
            parallel: true,
            timeout_secs: None,
        }
    }
}

impl ExtractionConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults rescaled for oracles whose Jacobian comes from central
    /// differences with step `step`.
    ///
    /// Near a boundary the estimate blends both sides over a band a few
    /// `step`s wide, and rounding noise grows like `1/step`; position,
    /// noise and rank tolerances are widened to sit above both.
    pub fn for_finite_differences(step: f64) -> Self {
        let step = step.abs().max(f64::EPSILON);
        Self {
            position_tolerance: 100.0 * step,
            noise_floor: (1e3 * step).max(1e-6),
            rank_tolerance: 1e-3,
            angular_tolerance: 0.05,
            validation_tolerance: 1e-2,
            probe_margin: (1e4 * step).max(1e-2),
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ExtractionError::InvalidConfig(format!("Failed to parse YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            ExtractionError::InvalidConfig(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ExtractionError::InvalidConfig(format!("Failed to write YAML: {e}")))
    }

    /// Set the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the clustering merge angle (radians)
    pub fn with_angular_tolerance(mut self, radians: f64) -> Self {
        self.angular_tolerance = radians;
        self
    }

    /// Set the bisection stop width
    pub fn with_position_tolerance(mut self, tolerance: f64) -> Self {
        self.position_tolerance = tolerance;
        self
    }

    /// Set the noise floor
    pub fn with_noise_floor(mut self, floor: f64) -> Self {
        self.noise_floor = floor;
        self
    }

    /// Set the maximum number of widen-and-retry rounds
    pub fn with_retry_cap(mut self, cap: usize) -> Self {
        self.retry_cap = cap;
        self
    }

    /// Set the output-layer sample budget
    pub fn with_sample_budget(mut self, budget: usize) -> Self {
        self.sample_budget = budget;
        self
    }

    /// Set the validation tolerance
    pub fn with_validation_tolerance(mut self, tolerance: f64) -> Self {
        self.validation_tolerance = tolerance;
        self
    }

    /// Set the first-round search bound
    pub fn with_search_bound(mut self, bound: f64) -> Self {
        self.initial_search_bound = bound;
        self
    }

    /// Set the number of coarse grid cells per line
    pub fn with_grid_steps(mut self, steps: usize) -> Self {
        self.grid_steps = steps;
        self
    }

    /// Set line searches per batch
    pub fn with_lines_per_batch(mut self, lines: usize) -> Self {
        self.lines_per_batch = lines;
        self
    }

    /// Set batches allowed per round
    pub fn with_max_batches_per_round(mut self, batches: usize) -> Self {
        self.max_batches_per_round = batches;
        self
    }

    /// Set the target critical points per neuron
    pub fn with_points_per_neuron(mut self, points: usize) -> Self {
        self.points_per_neuron = points;
        self
    }

    /// Set resampling attempts for rank-deficient solves
    pub fn with_output_solve_retries(mut self, retries: usize) -> Self {
        self.output_solve_retries = retries;
        self
    }

    /// Set the sampling spread around anchors
    pub fn with_sample_spread(mut self, spread: f64) -> Self {
        self.sample_spread = spread;
        self
    }

    /// Set the sign-probe margin
    pub fn with_probe_margin(mut self, margin: f64) -> Self {
        self.probe_margin = margin;
        self
    }

    /// Drop unresolved neurons instead of failing
    pub fn with_drop_unresolved(mut self, drop: bool) -> Self {
        self.drop_unresolved = drop;
        self
    }

    /// Enable or disable parallel line searches
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the wall-clock limit
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Cosine threshold equivalent to `angular_tolerance`
    pub fn merge_cosine(&self) -> f64 {
        self.angular_tolerance.cos()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ExtractionError::InvalidConfig(format!("{name} must be positive, got {value}")))
            }
        }
        fn at_least(name: &str, value: usize, min: usize) -> Result<()> {
            if value >= min {
                Ok(())
            } else {
                Err(ExtractionError::InvalidConfig(format!("{name} must be at least {min}, got {value}")))
            }
        }

        if !(self.angular_tolerance > 0.0 && self.angular_tolerance < FRAC_PI_2) {
            return Err(ExtractionError::InvalidConfig(format!(
                "angular_tolerance must be in (0, pi/2) radians, got {}",
                self.angular_tolerance
            )));
        }
        positive("position_tolerance", self.position_tolerance)?;
        positive("noise_floor", self.noise_floor)?;
        positive("validation_tolerance", self.validation_tolerance)?;
        positive("initial_search_bound", self.initial_search_bound)?;
        positive("probe_margin", self.probe_margin)?;
        if !(self.bound_growth.is_finite() && self.bound_growth >= 1.0) {
            return Err(ExtractionError::InvalidConfig(format!(
                "bound_growth must be >= 1, got {}",
                self.bound_growth
            )));
        }
        if !(self.rank_tolerance > 0.0 && self.rank_tolerance < 1.0) {
            return Err(ExtractionError::InvalidConfig(format!(
                "rank_tolerance must be in (0, 1), got {}",
                self.rank_tolerance
            )));
        }
        if !(self.sample_spread.is_finite() && self.sample_spread >= 0.0) {
            return Err(ExtractionError::InvalidConfig(format!(
                "sample_spread must be non-negative, got {}",
                self.sample_spread
            )));
        }
        if let Some(secs) = self.timeout_secs {
            positive("timeout_secs", secs)?;
        }
        at_least("grid_steps", self.grid_steps, 1)?;
        at_least("lines_per_batch", self.lines_per_batch, 1)?;
        at_least("max_batches_per_round", self.max_batches_per_round, 1)?;
        at_least("points_per_neuron", self.points_per_neuron, 3)?;
        at_least("min_cluster_size", self.min_cluster_size, 1)?;
        at_least("sample_budget", self.sample_budget, 1)?;
        at_least("validation_samples", self.validation_samples, 1)?;
        Ok(())
    }
}
