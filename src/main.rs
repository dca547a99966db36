//! extraer CLI
//!
//! # Usage
//!
//! ```bash
//! # Write a random victim network
//! extraer synth --inputs 20 --hidden 8 --outputs 4 --seed 7 -o victim.json
//!
//! # Extract it and compare against the original
//! extraer extract victim.json -o recovered.json --compare
//!
//! # Extract using finite-difference gradients only
//! extraer extract victim.json --fd-step 1e-6
//!
//! # Check a config file
//! extraer validate-config extraction.yaml --detailed
//! ```

use clap::Parser;
use extraer::cli::{init_tracing, run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
