//! CLI command tests
//!
//! End-to-end runs of each command against files in a temp directory.

use super::*;
use crate::cli::{ExtractArgs, LogLevel, SynthArgs, ValidateConfigArgs};
use crate::extract::ExtractedModel;
use crate::oracle::ReluNetwork;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a small victim network and return its path
fn create_victim(dir: &TempDir, hidden: usize) -> PathBuf {
    let path = dir.path().join("victim.json");
    let args = SynthArgs { inputs: 5, hidden, outputs: 2, seed: 3, output: path.clone() };
    synth::run_synth(args, LogLevel::Quiet).unwrap();
    path
}

fn extract_args(victim: &Path) -> ExtractArgs {
    ExtractArgs {
        victim: victim.to_path_buf(),
        hidden: None,
        config: None,
        seed: None,
        pool_size: 32,
        pool_seed: 1,
        fd_step: None,
        sequential: false,
        output: None,
        report: None,
        compare: false,
    }
}

#[test]
fn test_synth_writes_loadable_network() {
    let dir = TempDir::new().unwrap();
    let path = create_victim(&dir, 3);
    let network = extract::load_victim(&path).unwrap();
    assert_eq!(network, ReluNetwork::random(5, 3, 2, 3));
}

#[test]
fn test_network_and_model_json_round_trip_exactly() {
    let net = ReluNetwork::random(7, 5, 3, 99);
    let json = serde_json::to_string(&net).unwrap();
    let parsed: ReluNetwork = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, net);

    let model = ExtractedModel { w0: net.w0.clone(), b0: net.b0.clone(), w1: net.w1, b1: net.b1 };
    let json = serde_json::to_string_pretty(&model).unwrap();
    let parsed: ExtractedModel = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, model);
}

#[test]
fn test_synth_rejects_zero_dimension() {
    let dir = TempDir::new().unwrap();
    let args = SynthArgs {
        inputs: 0,
        hidden: 2,
        outputs: 2,
        seed: 0,
        output: dir.path().join("bad.json"),
    };
    assert!(synth::run_synth(args, LogLevel::Quiet).is_err());
}

#[test]
fn test_extract_command_writes_model_and_report() {
    let dir = TempDir::new().unwrap();
    let victim = create_victim(&dir, 3);
    let model_path = dir.path().join("model.json");
    let report_path = dir.path().join("report.json");

    let args = ExtractArgs {
        output: Some(model_path.clone()),
        report: Some(report_path.clone()),
        compare: true,
        ..extract_args(&victim)
    };
    extract::run_extract(args, LogLevel::Quiet).unwrap();

    let model: ExtractedModel =
        serde_json::from_str(&std::fs::read_to_string(&model_path).unwrap()).unwrap();
    assert_eq!(model.w0.shape(), &[3, 5]);
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert!(report["critical_points"].as_array().is_some_and(|p| p.len() >= 9));
}

#[test]
fn test_extract_command_with_wrong_width_fails() {
    let dir = TempDir::new().unwrap();
    let victim = create_victim(&dir, 3);
    let args = ExtractArgs { hidden: Some(5), sequential: true, ..extract_args(&victim) };
    let err = extract::run_extract(args, LogLevel::Quiet).unwrap_err();
    assert!(err.contains("Cluster count mismatch"), "{err}");
}

#[test]
fn test_extract_command_missing_victim() {
    let args = extract_args(Path::new("/nonexistent/victim.json"));
    let err = extract::run_extract(args, LogLevel::Quiet).unwrap_err();
    assert!(err.contains("Failed to read"));
}

#[test]
fn test_extract_command_rejects_malformed_victim() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("victim.json");
    std::fs::write(&path, "{\"w0\": 1}").unwrap();
    let err = extract::run_extract(extract_args(&path), LogLevel::Quiet).unwrap_err();
    assert!(err.contains("Invalid network JSON"));
}

#[test]
fn test_resolve_config_precedence() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "seed: 11\ngrid_steps: 32\n").unwrap();

    let args = ExtractArgs {
        config: Some(config_path),
        seed: Some(12),
        fd_step: Some(1e-5),
        sequential: true,
        ..extract_args(Path::new("unused.json"))
    };
    let config = extract::resolve_config(&args).unwrap();
    assert_eq!(config.seed, 12);
    assert_eq!(config.grid_steps, 32);
    assert!(!config.parallel);

    let fd_only = ExtractArgs { fd_step: Some(1e-5), ..extract_args(Path::new("unused.json")) };
    let config = extract::resolve_config(&fd_only).unwrap();
    assert_eq!(config, crate::extract::ExtractionConfig::for_finite_differences(1e-5));
}

#[test]
fn test_validate_config_command() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.yaml");
    std::fs::write(&good, "seed: 3\nangular_tolerance: 0.05\n").unwrap();
    let args = ValidateConfigArgs { config: good, detailed: true };
    assert!(validate::run_validate_config(args, LogLevel::Quiet).is_ok());

    let bad = dir.path().join("bad.yaml");
    std::fs::write(&bad, "points_per_neuron: 1\n").unwrap();
    let args = ValidateConfigArgs { config: bad, detailed: false };
    let err = validate::run_validate_config(args, LogLevel::Quiet).unwrap_err();
    assert!(err.contains("points_per_neuron"));
}

#[test]
fn test_validate_config_missing_file() {
    let args = ValidateConfigArgs { config: PathBuf::from("/nonexistent.yaml"), detailed: false };
    assert!(validate::run_validate_config(args, LogLevel::Quiet).is_err());
}

#[test]
fn test_run_command_dispatches() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("net.json");
    let cli = Cli {
        command: Command::Synth(SynthArgs { inputs: 3, hidden: 2, outputs: 2, seed: 1, output: output.clone() }),
        verbose: false,
        quiet: true,
    };
    run_command(cli).unwrap();
    assert!(output.exists());
}

#[test]
fn test_cli_parses_extract_flags() {
    use clap::Parser;
    let cli = Cli::try_parse_from([
        "extraer", "extract", "victim.json", "--hidden", "4", "--fd-step", "1e-6", "--compare", "-q",
    ])
    .unwrap();
    assert_eq!(cli.log_level(), LogLevel::Quiet);
    match cli.command {
        Command::Extract(args) => {
            assert_eq!(args.hidden, Some(4));
            assert_eq!(args.fd_step, Some(1e-6));
            assert!(args.compare);
        }
        other => panic!("unexpected command {other:?}"),
    }
}
