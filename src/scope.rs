//! Scope and path resolution for dwim.
//!
//! This module provides the "environment resolution" layer that decides
//! which namespace an invocation belongs to and where its state lives.
//!
//! All dwim commands must use this module to locate command directories,
//! the usage ledger, and clarification artifacts, so that operations see
//! the same state regardless of where the command is invoked from.
//!
//! Scope rules:
//! - A `.dwim/commands/` directory in the working directory's ancestry
//!   makes the invocation project-local, rooted at the marker's parent.
//! - Otherwise the invocation is user-level, rooted at `$DWIM_HOME`
//!   (default `~/.dwim`).
//! - The upstream-universal scope is never auto-selected; it exists only
//!   as a designation the promotion analyzer can surface suggestions for.

use crate::error::{DwimError, Result};
use crate::git;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Project-local marker directory name.
pub const PROJECT_MARKER_DIR: &str = ".dwim";

/// Command directory name within a scope root.
pub const COMMANDS_DIR: &str = "commands";

/// Namespace an invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Bound to one repository via a `.dwim/commands/` marker.
    ProjectLocal,
    /// The caller's own configuration root.
    UserLevel,
    /// The shim's shared command set; resolved only through this
    /// repository's release process, never at runtime.
    UpstreamUniversal,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::ProjectLocal => write!(f, "project-local"),
            Scope::UserLevel => write!(f, "user-level"),
            Scope::UpstreamUniversal => write!(f, "upstream-universal"),
        }
    }
}

/// Resolved paths and scope for one invocation.
///
/// All paths are absolute. Resolution never fails beyond the initial
/// working-directory read; a directory with no marker and no repository
/// degrades to user-level scope with no identity.
#[derive(Debug, Clone)]
pub struct ScopeContext {
    /// Working directory the invocation ran from.
    pub cwd: PathBuf,

    /// Scope the invocation belongs to.
    pub scope: Scope,

    /// Project-local commands directory, when the marker was found.
    pub project_commands_dir: Option<PathBuf>,

    /// User-level root (`$DWIM_HOME` or `~/.dwim`).
    pub user_root: PathBuf,

    /// Ledger file path, honoring the `DWIM_LEDGER` override.
    pub ledger_path: PathBuf,

    /// Repository identity (remote URL) of `cwd`'s repo, if any.
    pub repo_identity: Option<String>,
}

impl ScopeContext {
    /// Resolve the scope context from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            DwimError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Ok(Self::resolve_from(&cwd))
    }

    /// Resolve the scope context from a specific directory.
    ///
    /// Reads `DWIM_HOME` and `DWIM_LEDGER` from the environment; tests
    /// that need fixed roots should use [`ScopeContext::with_roots`].
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Self {
        let cwd = cwd.as_ref().to_path_buf();
        let user_root = env::var_os("DWIM_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_user_root);
        let ledger_override = env::var_os("DWIM_LEDGER").map(PathBuf::from);

        Self::with_roots(cwd, user_root, ledger_override)
    }

    /// Resolve against explicit roots, bypassing the environment.
    pub fn with_roots(
        cwd: PathBuf,
        user_root: PathBuf,
        ledger_override: Option<PathBuf>,
    ) -> Self {
        let project_commands_dir = find_project_marker(&cwd);
        let scope = if project_commands_dir.is_some() {
            Scope::ProjectLocal
        } else {
            Scope::UserLevel
        };
        let repo_identity = git::repo_identity(&cwd);
        let ledger_path = ledger_override
            .unwrap_or_else(|| user_root.join("ledger").join("ledger.ndjson"));

        Self {
            cwd,
            scope,
            project_commands_dir,
            user_root,
            ledger_path,
            repo_identity,
        }
    }

    /// User-level commands directory.
    pub fn user_commands_dir(&self) -> PathBuf {
        self.user_root.join(COMMANDS_DIR)
    }

    /// Command directories in lookup order: project-local first (when
    /// present), then user-level. Upstream-universal is never probed.
    pub fn command_dirs(&self) -> Vec<(Scope, PathBuf)> {
        let mut dirs = Vec::with_capacity(2);
        if let Some(project) = &self.project_commands_dir {
            dirs.push((Scope::ProjectLocal, project.clone()));
        }
        dirs.push((Scope::UserLevel, self.user_commands_dir()));
        dirs
    }

    /// Directory a promoted resolution for `scope` should be written to.
    ///
    /// Returns `None` for upstream-universal (suggestions only) and for
    /// project-local when this invocation has no project marker.
    pub fn write_dir(&self, scope: Scope) -> Option<PathBuf> {
        match scope {
            Scope::ProjectLocal => self.project_commands_dir.clone(),
            Scope::UserLevel => Some(self.user_commands_dir()),
            Scope::UpstreamUniversal => None,
        }
    }

    /// Directory holding clarification request files.
    pub fn clarifications_dir(&self) -> PathBuf {
        self.user_root.join("clarifications")
    }

    /// NDJSON cache of resolved (intent, answers) mappings.
    pub fn resolution_cache_path(&self) -> PathBuf {
        self.clarifications_dir().join("cache.ndjson")
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.user_root.join("config.yaml")
    }
}

/// Walk up from `cwd` looking for a `.dwim/commands/` directory.
fn find_project_marker(cwd: &Path) -> Option<PathBuf> {
    let mut current = Some(cwd);
    while let Some(dir) = current {
        let candidate = dir.join(PROJECT_MARKER_DIR).join(COMMANDS_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

/// Default user root: `~/.dwim`, or `.dwim` when HOME is unset.
fn default_user_root() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROJECT_MARKER_DIR)
}
