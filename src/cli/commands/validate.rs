//! Validate-config command implementation

use crate::cli::logging::log;
use crate::cli::{LogLevel, ValidateConfigArgs};
use crate::extract::ExtractionConfig;

/// Format search settings as a string
pub fn format_search_info(config: &ExtractionConfig) -> String {
    [
        format!("  Seed: {}", config.seed),
        format!(
            "  Search bound: {} (x{} per round, {} retries)",
            config.initial_search_bound, config.bound_growth, config.retry_cap
        ),
        format!(
            "  Lines: {} per batch, {} batches per round",
            config.lines_per_batch, config.max_batches_per_round
        ),
        format!("  Grid steps: {}", config.grid_steps),
        format!("  Parallel: {}", config.parallel),
    ]
    .join("\n")
}

/// Format numerical tolerances as a string
pub fn format_tolerance_info(config: &ExtractionConfig) -> String {
    [
        format!("  Angular tolerance: {} rad", config.angular_tolerance),
        format!("  Position tolerance: {:e}", config.position_tolerance),
        format!("  Noise floor: {:e}", config.noise_floor),
        format!("  Rank tolerance: {:e}", config.rank_tolerance),
        format!("  Validation tolerance: {:e}", config.validation_tolerance),
    ]
    .join("\n")
}

/// Format calibration and output-solve settings as a string
pub fn format_solve_info(config: &ExtractionConfig) -> String {
    let mut lines = vec![
        format!("  Probe margin: {} ({} retries)", config.probe_margin, config.probe_retries),
        format!("  Drop unresolved: {}", config.drop_unresolved),
        format!(
            "  Sample budget: {} (spread {}, {} retries)",
            config.sample_budget, config.sample_spread, config.output_solve_retries
        ),
        format!("  Validation samples: {}", config.validation_samples),
    ];
    if let Some(secs) = config.timeout_secs {
        lines.push(format!("  Timeout: {secs}s"));
    }
    lines.join("\n")
}

pub fn run_validate_config(args: ValidateConfigArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let config = ExtractionConfig::from_yaml_file(&args.config)
        .map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        log(level, LogLevel::Normal, "");
        log(level, LogLevel::Normal, "Search:");
        log(level, LogLevel::Normal, &format_search_info(&config));
        log(level, LogLevel::Normal, "Tolerances:");
        log(level, LogLevel::Normal, &format_tolerance_info(&config));
        log(level, LogLevel::Normal, "Solve:");
        log(level, LogLevel::Normal, &format_solve_info(&config));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_search_info() {
        let info = format_search_info(&ExtractionConfig::default().with_seed(5));
        assert!(info.contains("Seed: 5"));
        assert!(info.contains("Grid steps: 64"));
    }

    #[test]
    fn test_format_solve_info_includes_timeout_only_when_set() {
        let config = ExtractionConfig::default();
        assert!(!format_solve_info(&config).contains("Timeout"));
        assert!(format_solve_info(&config.with_timeout_secs(30.0)).contains("Timeout: 30s"));
    }

    #[test]
    fn test_format_tolerance_info() {
        let info = format_tolerance_info(&ExtractionConfig::default());
        assert!(info.contains("Noise floor: 1e-6"));
    }
}
