//! CLI module for extraer
//!
//! Thin shell over the library: argument types, command handlers and
//! logging setup.

mod args;
mod commands;
mod logging;

pub use args::{Cli, Command, ExtractArgs, SynthArgs, ValidateConfigArgs};
pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};
