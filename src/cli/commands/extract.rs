//! Extract command implementation

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::cli::logging::log;
use crate::cli::{ExtractArgs, LogLevel};
use crate::extract::{
    compare_models, gaussian_pool, ExtractionConfig, ExtractionReport, Extractor, ModelComparison,
};
use crate::oracle::{CountingOracle, FiniteDifferenceOracle, Oracle, QueryCounts, ReluNetwork};

/// Load a victim network and re-check its shapes.
pub fn load_victim(path: &Path) -> Result<ReluNetwork, String> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let network: ReluNetwork =
        serde_json::from_str(&json).map_err(|e| format!("Invalid network JSON: {e}"))?;
    ReluNetwork::new(network.w0, network.b0, network.w1, network.b1)
        .map_err(|e| format!("Invalid network: {e}"))
}

/// Resolve the extraction config from the arguments.
pub fn resolve_config(args: &ExtractArgs) -> Result<ExtractionConfig, String> {
    let mut config = match (&args.config, args.fd_step) {
        (Some(path), _) => {
            ExtractionConfig::from_yaml_file(path).map_err(|e| format!("Config error: {e}"))?
        }
        (None, Some(step)) => ExtractionConfig::for_finite_differences(step),
        (None, None) => ExtractionConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate().map_err(|e| format!("Config error: {e}"))?;
    Ok(config)
}

fn run_attack<O: Oracle>(
    oracle: O,
    hidden: usize,
    pool_size: usize,
    pool_seed: u64,
    config: ExtractionConfig,
) -> Result<(ExtractionReport, QueryCounts), String> {
    let counting = CountingOracle::new(oracle);
    let pool = gaussian_pool(pool_size, counting.input_dim(), pool_seed);
    let mut extractor =
        Extractor::new(&counting, hidden, pool, config).map_err(|e| format!("Setup failed: {e}"))?;
    let report = extractor.run().map_err(|e| format!("Extraction failed: {e}"))?;
    Ok((report, counting.counts()))
}

/// Format the run summary as a string
pub fn format_summary(report: &ExtractionReport, counts: QueryCounts) -> String {
    let d = &report.diagnostics;
    let mut lines = vec![
        format!("  Hidden units: {}", report.model.hidden_width()),
        format!("  Rounds: {} (final bound {:.3})", d.rounds, d.final_bound),
        format!("  Critical points: {} from {} lines", d.critical_points.len(), d.lines),
        format!(
            "  Rejected: {} ambiguous, {} below floor, {} unclustered",
            d.rejections.ambiguous, d.rejections.below_floor, d.rejections.unclustered
        ),
        format!(
            "  Queries: {} ({} forward, {} jacobian)",
            counts.total(),
            counts.outputs,
            counts.jacobians
        ),
    ];
    if let Some(v) = &d.validation {
        lines.push(format!(
            "  Validation: max error {:.3e}, mean {:.3e} over {} points",
            v.max_error,
            v.mean_error,
            v.total()
        ));
    }
    if !d.dropped.is_empty() {
        lines.push(format!("  Dropped neurons: {:?}", d.dropped));
    }
    lines.join("\n")
}

/// Format a comparison against the victim as a string
pub fn format_comparison(comparison: &ModelComparison) -> String {
    [
        format!("  Matched neurons: {}", comparison.matches.len()),
        format!("  Signs agree: {}", comparison.signs_agree),
        format!("  Max weight error: {:.3e}", comparison.max_weight_error),
        format!("  Max bias error: {:.3e}", comparison.max_bias_error),
        format!("  Max output weight error: {:.3e}", comparison.max_output_weight_error),
        format!("  Output bias error: {:.3e}", comparison.output_bias_error),
    ]
    .join("\n")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize: {e}"))?;
    fs::write(path, json).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

pub fn run_extract(args: ExtractArgs, level: LogLevel) -> Result<(), String> {
    let victim = load_victim(&args.victim)?;
    let config = resolve_config(&args)?;
    let hidden = args.hidden.unwrap_or_else(|| victim.hidden_width());

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Extracting {} ({} inputs, {} hidden, {} outputs)",
            args.victim.display(),
            victim.input_dim(),
            hidden,
            victim.output_dim()
        ),
    );

    let (report, counts) = match args.fd_step {
        Some(step) => {
            let oracle = FiniteDifferenceOracle::new(&victim, step)
                .map_err(|e| format!("Invalid finite-difference step: {e}"))?;
            run_attack(oracle, hidden, args.pool_size, args.pool_seed, config)?
        }
        None => run_attack(&victim, hidden, args.pool_size, args.pool_seed, config)?,
    };

    log(level, LogLevel::Normal, "Extraction succeeded");
    log(level, LogLevel::Normal, &format_summary(&report, counts));

    if args.compare {
        let comparison = compare_models(&report.model, &victim);
        log(level, LogLevel::Normal, "Comparison with victim:");
        log(level, LogLevel::Normal, &format_comparison(&comparison));
    }

    if let Some(path) = &args.output {
        write_json(path, &report.model)?;
        log(level, LogLevel::Verbose, &format!("Model written to {}", path.display()));
    }
    if let Some(path) = &args.report {
        write_json(path, &report.diagnostics)?;
        log(level, LogLevel::Verbose, &format!("Diagnostics written to {}", path.display()));
    }

    Ok(())
}
