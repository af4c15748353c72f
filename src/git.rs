//! Best-effort repository identity detection.
//!
//! The scope resolver records which repository an invocation ran in so the
//! ledger can be mined per-project even when invocations come from different
//! checkouts of the same remote. Everything here is best-effort: a missing
//! git binary or a non-repo directory simply yields no identity.

use std::path::Path;
use std::process::Command;

/// Return the repository identity for a working directory, if any.
///
/// Prefers the `origin` remote URL; falls back to any configured remote.
/// Returns `None` outside a repository or when no remote is configured.
pub fn repo_identity(cwd: &Path) -> Option<String> {
    if let Some(url) = run_git(cwd, &["remote", "get-url", "origin"]) {
        return Some(url);
    }

    // No origin; take the first remote listed, if any.
    let remotes = run_git(cwd, &["remote"])?;
    let first = remotes.lines().next()?.trim().to_string();
    if first.is_empty() {
        return None;
    }
    run_git(cwd, &["remote", "get-url", &first])
}

/// Run a git command in `cwd`, returning trimmed stdout on success.
fn run_git(cwd: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .args(args)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() { None } else { Some(stdout) }
}
