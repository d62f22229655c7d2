//! CLI module for commitguard
//!
//! Provides command-line interface for:
//! - check: Load and validate a model
//! - explain: Show the effective policies of an entity type

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, explain, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
