//! CLI command implementations

mod extract;
mod synth;
mod validate;

#[cfg(test)]
mod tests;

use crate::cli::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = cli.log_level();

    match cli.command {
        Command::Synth(args) => synth::run_synth(args, log_level),
        Command::Extract(args) => extract::run_extract(args, log_level),
        Command::ValidateConfig(args) => validate::run_validate_config(args, log_level),
    }
}
