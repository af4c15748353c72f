//! Configuration for dwim.
//!
//! Settings live in `{user_root}/config.yaml`. Unknown fields are ignored
//! for forward compatibility, and every field has a default so a missing
//! file yields a working configuration. Environment variables override
//! file values so agent callers can tune a single invocation.

use crate::error::{DwimError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the dwim shim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Interpretation settings
    // =========================================================================
    /// Command invoked as the interpretation service. Receives a JSON
    /// request on stdin and must reply with a JSON outcome on stdout.
    #[serde(default = "default_interpreter_command")]
    pub interpreter_command: String,

    /// Seconds to wait for the interpretation service before giving up.
    #[serde(default = "default_interpret_timeout_secs")]
    pub interpret_timeout_secs: u64,

    // =========================================================================
    // Clarification settings
    // =========================================================================
    /// Minutes before a clarification token expires.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    // =========================================================================
    // Promotion settings
    // =========================================================================
    /// Minimum occurrences of an intent key before it is a candidate.
    #[serde(default = "default_promote_min_frequency")]
    pub promote_min_frequency: usize,

    /// Minimum share of the modal action string for auto-materialization.
    /// Candidates below this are surfaced as suggestions only.
    #[serde(default = "default_promote_min_stability")]
    pub promote_min_stability: f64,

    /// Days of ledger history the analyzer scans.
    #[serde(default = "default_promote_window_days")]
    pub promote_window_days: i64,
}

fn default_interpreter_command() -> String {
    "dwim-interpret".to_string()
}

fn default_interpret_timeout_secs() -> u64 {
    30
}

fn default_token_ttl_minutes() -> i64 {
    24 * 60
}

fn default_promote_min_frequency() -> usize {
    50
}

fn default_promote_min_stability() -> f64 {
    0.8
}

fn default_promote_window_days() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interpreter_command: default_interpreter_command(),
            interpret_timeout_secs: default_interpret_timeout_secs(),
            token_ttl_minutes: default_token_ttl_minutes(),
            promote_min_frequency: default_promote_min_frequency(),
            promote_min_stability: default_promote_min_stability(),
            promote_window_days: default_promote_window_days(),
        }
    }
}

impl Config {
    /// Load the config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DwimError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            DwimError::UserError(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load the config, falling back to defaults, then apply environment
    /// overrides. This is the entry point commands use.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Self {
        let mut config = Self::load(path).unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    /// Apply `DWIM_*` environment overrides on top of file values.
    ///
    /// Unparseable numeric values are ignored rather than fatal; a bad
    /// override must not turn a working command into a failing one.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(cmd) = std::env::var("DWIM_INTERPRETER")
            && !cmd.trim().is_empty()
        {
            self.interpreter_command = cmd;
        }
        if let Ok(raw) = std::env::var("DWIM_INTERPRET_TIMEOUT_SECS")
            && let Ok(secs) = raw.trim().parse::<u64>()
        {
            self.interpret_timeout_secs = secs;
        }
        if let Ok(raw) = std::env::var("DWIM_TOKEN_TTL_MINUTES")
            && let Ok(minutes) = raw.trim().parse::<i64>()
        {
            self.token_ttl_minutes = minutes;
        }
    }
}
