//! Dwim: an intent-resolution shim between agent callers and CLI tools.
//!
//! This is the main entry point for the `dwim` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;
pub mod clarify;
pub mod config;
pub mod error;
pub mod exec;
pub mod exit_codes;
pub mod fs;
pub mod git;
pub mod interpret;
pub mod ledger;
pub mod lookup;
pub mod promote;
pub mod scope;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        // Child action exit codes pass through unchanged.
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
