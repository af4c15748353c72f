//! Command implementations for dwim.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the small helpers the dispatch and retry paths
//! share for finishing an execution and announcing a pending
//! clarification.

mod dispatch;
mod promote;
mod retry;
mod usage;

use crate::cli::{Cli, Command};
use crate::clarify::ClarificationRequest;
use crate::error::Result;
use crate::exec::ExecutionOutcome;
use crate::exit_codes;
use crate::ledger::{self, Invocation, InvocationOutcome, ResolutionPath};
use crate::scope::ScopeContext;
use std::time::Instant;

/// Dispatch a parsed command line to its implementation.
///
/// Returns the process exit code for terminal states that are not
/// errors (success, propagated action failures, clarification pending);
/// genuine errors map to exit codes via `DwimError::exit_code`.
pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Some(Command::Retry(args)) => retry::cmd_retry(args),
        Some(Command::Usage(args)) => usage::cmd_usage(args),
        Some(Command::Promote(args)) => promote::cmd_promote(args),
        None => dispatch::cmd_dispatch(cli.intent),
    }
}

/// Log an execution result and translate it into an exit code.
///
/// The action's exit code passes through unchanged; a non-zero exit is
/// recorded as a failed outcome but never masked or remapped. Ledger
/// writes are best-effort so a full disk cannot break a working command.
pub(crate) fn finish_execution(
    ctx: &ScopeContext,
    invocation: Invocation,
    path: ResolutionPath,
    action: Option<String>,
    result: Result<ExecutionOutcome>,
    success_outcome: InvocationOutcome,
    started: Instant,
) -> Result<i32> {
    match result {
        Ok(outcome) => {
            let recorded = if outcome.is_success() {
                success_outcome
            } else {
                InvocationOutcome::Failed
            };
            let record = invocation.resolved(path, action).finished(recorded, started);
            ledger::append_best_effort(&ctx.ledger_path, &record);
            if !outcome.is_success() {
                eprintln!("dwim: action exited with code {}", outcome.exit_code);
            }
            Ok(outcome.exit_code)
        }
        Err(e) => {
            let record = invocation
                .resolved(path, action)
                .finished(InvocationOutcome::Failed, started);
            ledger::append_best_effort(&ctx.ledger_path, &record);
            Err(e)
        }
    }
}

/// Print the clarification-pending message with retry instructions.
pub(crate) fn announce_pending(request: &ClarificationRequest) {
    println!("This request needs clarification before it can run:");
    for (i, question) in request.questions.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
    println!();
    println!("Answer with:");
    println!("  dwim retry {} <answers...>", request.token);
    println!();
    println!(
        "Token: {} (expires {})",
        request.token,
        request.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

/// Log a pending clarification and return its exit code.
pub(crate) fn finish_pending(
    ctx: &ScopeContext,
    invocation: Invocation,
    started: Instant,
) -> Result<i32> {
    let record = invocation
        .resolved(ResolutionPath::Unresolved, None)
        .finished(InvocationOutcome::ClarificationPending, started);
    ledger::append_best_effort(&ctx.ledger_path, &record);
    Ok(exit_codes::CLARIFICATION_PENDING)
}
