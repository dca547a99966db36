//! Synth command implementation

use std::fs;

use crate::cli::logging::log;
use crate::cli::{LogLevel, SynthArgs};
use crate::oracle::ReluNetwork;

pub fn run_synth(args: SynthArgs, level: LogLevel) -> Result<(), String> {
    if args.inputs == 0 || args.hidden == 0 || args.outputs == 0 {
        return Err(format!(
            "All dimensions must be positive, got {}x{}x{}",
            args.inputs, args.hidden, args.outputs
        ));
    }

    let network = ReluNetwork::random(args.inputs, args.hidden, args.outputs, args.seed);
    let json = serde_json::to_string_pretty(&network)
        .map_err(|e| format!("Failed to serialize network: {e}"))?;
    fs::write(&args.output, json)
        .map_err(|e| format!("Failed to write {}: {e}", args.output.display()))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Wrote {}x{}x{} network (seed {}) to {}",
            args.inputs,
            args.hidden,
            args.outputs,
            args.seed,
            args.output.display()
        ),
    );
    Ok(())
}
