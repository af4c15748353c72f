//! CLI argument parsing for dwim.
//!
//! Uses clap derive macros for declarative argument definitions.
//! The default (no subcommand) form treats everything after `dwim` as
//! free-form intent words; `retry`, `usage`, and `promote` are reserved
//! subcommand names and cannot be intent words themselves.

use clap::{Parser, Subcommand};

/// Dwim: intent-resolution shim that learns native commands from usage.
///
/// A free-form invocation resolves through the cheapest available path:
/// native command directories first, then the clarification cache, then
/// the interpretation service.
#[derive(Parser, Debug)]
#[command(name = "dwim")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Free-form intent words, e.g. `dwim calendar delete "Test event"`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub intent: Vec<String>,
}

/// Reserved subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resume a pending clarification with answers.
    ///
    /// Answers are positional in question order, or addressed by index
    /// as `N=answer` (1-based).
    Retry(RetryArgs),

    /// Show a summary report over the usage ledger.
    Usage(UsageArgs),

    /// Mine the ledger for promotable intent→action mappings.
    ///
    /// Stable high-frequency mappings become native resolution scripts;
    /// unstable ones are printed as suggestions.
    Promote(PromoteArgs),
}

/// Arguments for the `retry` command.
#[derive(Parser, Debug)]
pub struct RetryArgs {
    /// Token printed by the original clarification-pending invocation.
    pub token: String,

    /// Answers to the clarifying questions.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub answers: Vec<String>,
}

/// Arguments for the `usage` command.
#[derive(Parser, Debug)]
pub struct UsageArgs {
    /// Limit the report to the last N days of records.
    #[arg(long)]
    pub since_days: Option<i64>,
}

/// Arguments for the `promote` command.
#[derive(Parser, Debug)]
pub struct PromoteArgs {
    /// Override the configured scan window.
    #[arg(long)]
    pub window_days: Option<i64>,

    /// Report what would be promoted without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
