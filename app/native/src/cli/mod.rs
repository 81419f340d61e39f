//! CLI module for rxdesk.
//!
//! `rxdesk serve` owns the desk. Every other command sends one request to the
//! serving process over its socket and prints the answer.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;

use crate::error::RxdeskError;

/// Runs the CLI.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), RxdeskError> {
    let cli = Cli::parse();
    cli.execute()
}
