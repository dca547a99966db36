//! Command-line argument types

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::LogLevel;

/// extraer: recover two-layer ReLU classifiers from gradient queries
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "extraer")]
#[command(version)]
#[command(about = "Functionally-equivalent extraction of two-layer ReLU classifiers")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Output level selected by the global flags.
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Quiet
        } else if self.verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Write a random two-layer ReLU network as JSON
    Synth(SynthArgs),

    /// Extract a victim network given as JSON
    Extract(ExtractArgs),

    /// Validate an extraction config file
    ValidateConfig(ValidateConfigArgs),
}

/// Arguments for the synth command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SynthArgs {
    /// Input dimension
    #[arg(long, default_value_t = 10)]
    pub inputs: usize,

    /// Hidden width
    #[arg(long, default_value_t = 4)]
    pub hidden: usize,

    /// Number of output classes
    #[arg(long, default_value_t = 3)]
    pub outputs: usize,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output JSON path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Arguments for the extract command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ExtractArgs {
    /// Victim network JSON (as written by `synth`)
    #[arg(value_name = "VICTIM")]
    pub victim: PathBuf,

    /// Declared hidden width (defaults to the victim's)
    #[arg(long)]
    pub hidden: Option<usize>,

    /// YAML extraction config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the config seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Gaussian sample pool size
    #[arg(long, default_value_t = 64)]
    pub pool_size: usize,

    /// Seed for the sample pool
    #[arg(long, default_value_t = 0)]
    pub pool_seed: u64,

    /// Estimate Jacobians by central differences with this step
    #[arg(long, value_name = "STEP")]
    pub fd_step: Option<f64>,

    /// Run line searches sequentially
    #[arg(long)]
    pub sequential: bool,

    /// Write the recovered model as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write full diagnostics as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Compare the recovered model against the victim
    #[arg(long)]
    pub compare: bool,
}

/// Arguments for the validate-config command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateConfigArgs {
    /// Path to YAML config file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Print every resolved setting
    #[arg(short, long)]
    pub detailed: bool,
}
