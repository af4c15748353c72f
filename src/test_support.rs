use crate::config::Config;
use crate::error::Result;
use crate::interpret::{InterpretRequest, Interpretation, Interpreter};
use crate::ledger::{Invocation, InvocationOutcome, ResolutionPath};
use crate::scope::{Scope, ScopeContext};
use std::cell::Cell;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Instant;
use tempfile::TempDir;

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets environment variables for a test and restores them on drop.
///
/// The process environment is global and not thread-safe. Tests using
/// this must also be annotated `#[serial]`; the lock is a backstop in
/// case an annotation is missed.
pub(crate) struct EnvGuard {
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub(crate) fn set(vars: &[(&'static str, &str)]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let saved = vars
            .iter()
            .map(|(key, _)| (*key, std::env::var_os(key)))
            .collect();
        for (key, value) in vars {
            unsafe { std::env::set_var(key, value) };
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

/// Build a user-level scope context rooted entirely inside a tempdir,
/// bypassing the environment.
pub(crate) fn sandbox_context(temp_dir: &TempDir) -> ScopeContext {
    let cwd = temp_dir.path().join("cwd");
    let user_root = temp_dir.path().join("home");
    std::fs::create_dir_all(&cwd).unwrap();
    std::fs::create_dir_all(&user_root).unwrap();
    ScopeContext::with_roots(cwd, user_root, None)
}

/// Write an executable `#!/bin/sh` script, creating parent directories.
pub(crate) fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// A ledger record the promotion analyzer considers learnable.
pub(crate) fn learnable_record(intent_key: &str, scope: Scope, action: &str) -> Invocation {
    Invocation::begin(
        intent_key.split_whitespace().map(str::to_string).collect(),
        intent_key.to_string(),
        scope,
        PathBuf::from("/tmp"),
        None,
    )
    .resolved(ResolutionPath::Interpretation, Some(action.to_string()))
    .finished(InvocationOutcome::Executed, Instant::now())
}

/// Interpreter stub that replays a fixed outcome and counts calls,
/// so tests can assert the gateway was (or was not) consulted.
pub(crate) struct StubInterpreter {
    pub outcome: Interpretation,
    pub calls: Cell<usize>,
}

impl StubInterpreter {
    pub(crate) fn act(command: &str) -> Self {
        Self::new(Interpretation::Act(command.to_string()))
    }

    pub(crate) fn clarify(questions: &[&str]) -> Self {
        Self::new(Interpretation::Clarify(
            questions.iter().map(|q| q.to_string()).collect(),
        ))
    }

    pub(crate) fn fail(reason: &str) -> Self {
        Self::new(Interpretation::Fail(reason.to_string()))
    }

    fn new(outcome: Interpretation) -> Self {
        Self {
            outcome,
            calls: Cell::new(0),
        }
    }
}

impl Interpreter for StubInterpreter {
    fn interpret(&self, _request: &InterpretRequest) -> Result<Interpretation> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.outcome.clone())
    }
}

/// Config with thresholds small enough for compact test fixtures.
pub(crate) fn test_config() -> Config {
    Config {
        promote_min_frequency: 3,
        token_ttl_minutes: 60,
        ..Config::default()
    }
}
