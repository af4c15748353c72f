//! Execution of resolved actions.
//!
//! A resolved action is either a native resolution (an executable file
//! plus the argv words its intent key did not consume) or an interpreted
//! command string. Either way the action runs with the caller's stdio so
//! its output is indistinguishable from running the tool directly, and
//! its exit status is propagated, never masked. No timeout applies here;
//! the only bounded call is the interpretation gateway.

use crate::error::{DwimError, Result};
use crate::lookup::NativeResolution;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

/// Result of running a resolved action.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Exit code of the action. A signal-terminated child reports 1.
    pub exit_code: i32,
    /// Wall-clock duration of the action.
    pub duration: Duration,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a native resolution with the argv remainder as its arguments.
pub fn run_native(
    resolution: &NativeResolution,
    argv: &[String],
    cwd: &Path,
) -> Result<ExecutionOutcome> {
    let rest = &argv[resolution.matched_words.min(argv.len())..];
    let mut command = Command::new(&resolution.path);
    command.args(rest).current_dir(cwd);
    run(command, &resolution.path.display().to_string())
}

/// Run an interpreted action command string.
pub fn run_action(action: &str, cwd: &Path) -> Result<ExecutionOutcome> {
    let args = shell_words::split(action).map_err(|e| {
        DwimError::UserError(format!(
            "failed to parse resolved action '{}': {}",
            action, e
        ))
    })?;
    if args.is_empty() {
        return Err(DwimError::UserError(format!(
            "resolved action is empty: '{}'",
            action
        )));
    }

    let mut command = Command::new(&args[0]);
    command.args(&args[1..]).current_dir(cwd);
    run(command, &args[0])
}

fn run(mut command: Command, program: &str) -> Result<ExecutionOutcome> {
    let started = Instant::now();
    let status = command.status().map_err(|e| {
        DwimError::ExecutionFailure(format!(
            "failed to execute '{}': {}\n\
             Fix: ensure the command is installed and in PATH.",
            program, e
        ))
    })?;

    Ok(ExecutionOutcome {
        exit_code: status.code().unwrap_or(1),
        duration: started.elapsed(),
    })
}
