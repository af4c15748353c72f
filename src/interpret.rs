//! The interpretation gateway: the last-resort resolution path.
//!
//! Wraps the external interpretation service behind the [`Interpreter`]
//! trait and normalizes its three outcome shapes into [`Interpretation`].
//! The gateway makes a single blocking call bounded by a timeout, never
//! retries, and never bypasses the native lookup chain — dispatch only
//! reaches it after every cheaper stage missed.
//!
//! # Wire format
//!
//! The service command receives a JSON request on stdin:
//!
//! ```json
//! {"argv": ["calendar", "delete", "Test event"],
//!  "intent_key": "calendar",
//!  "scope": "user-level",
//!  "cwd": "/home/user/project",
//!  "answers": ["Work"]}
//! ```
//!
//! and must reply on stdout with one of:
//!
//! ```json
//! {"outcome": "act", "command": "remove-and-sync 'Test event'"}
//! {"outcome": "clarify", "questions": ["which calendar?"]}
//! {"outcome": "fail", "reason": "no matching tool"}
//! ```

use crate::config::Config;
use crate::error::{DwimError, Result};
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Request handed to the interpretation service.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretRequest<'a> {
    /// Raw argument words.
    pub argv: &'a [String],
    /// Normalized intent key (first-token guess).
    pub intent_key: &'a str,
    /// Scope the invocation resolved in.
    pub scope: Scope,
    /// Working directory of the invocation.
    pub cwd: &'a Path,
    /// Clarification answers, present only on retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<&'a [String]>,
}

/// Normalized outcome of one interpretation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// The service produced an executable command string.
    Act(String),
    /// The service needs answers to the given questions first.
    Clarify(Vec<String>),
    /// The service declined; the reason is surfaced verbatim.
    Fail(String),
}

/// Seam between dispatch and the external service.
pub trait Interpreter {
    /// Resolve free text to an outcome. A single blocking call; the
    /// implementation must bound it with a timeout.
    fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation>;
}

/// Reply shape on the wire. Field-tagged so the service can add fields
/// without breaking older shims.
#[derive(Debug, Deserialize)]
struct WireReply {
    outcome: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Subprocess-backed interpreter.
pub struct CommandInterpreter {
    /// Command line to spawn, split with shell quoting rules.
    pub command: String,
    /// Seconds before the call is killed and reported as a timeout.
    pub timeout_secs: u64,
}

impl CommandInterpreter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.interpreter_command.clone(),
            timeout_secs: config.interpret_timeout_secs,
        }
    }
}

impl Interpreter for CommandInterpreter {
    fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation> {
        let args = shell_words::split(&self.command).map_err(|e| {
            DwimError::InterpretationFailure(format!(
                "failed to parse interpreter command '{}': {}",
                self.command, e
            ))
        })?;
        if args.is_empty() {
            return Err(DwimError::InterpretationFailure(
                "interpreter command is empty".to_string(),
            ));
        }

        let request_json = serde_json::to_string(request).map_err(|e| {
            DwimError::InterpretationFailure(format!("failed to serialize request: {}", e))
        })?;

        // Replies go through a temp file rather than a pipe so the child
        // can never block on a full pipe while we wait on it.
        let stdout_path = reply_path();
        let stdout_file = File::create(&stdout_path).map_err(|e| {
            DwimError::InterpretationFailure(format!(
                "failed to create reply file '{}': {}",
                stdout_path.display(),
                e
            ))
        })?;

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout_file))
            .spawn()
            .map_err(|e| {
                DwimError::InterpretationFailure(format!(
                    "failed to start interpreter '{}': {}\n\
                     Fix: set DWIM_INTERPRETER or `interpreter_command` in config.yaml \
                     to an installed command.",
                    args[0], e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // The write runs off-thread: a service that stalls without
            // reading stdin would otherwise block us on a full pipe before
            // the timeout loop ever starts. A closed pipe is fine, the
            // reply decides the outcome; killing the child on timeout
            // unblocks the writer.
            std::thread::spawn(move || {
                let _ = stdin.write_all(request_json.as_bytes());
            });
        }

        let timeout = Duration::from_secs(self.timeout_secs);
        let (exit_code, timed_out) = wait_with_timeout(&mut child, timeout)?;
        let reply = std::fs::read_to_string(&stdout_path).unwrap_or_default();
        let _ = std::fs::remove_file(&stdout_path);

        if timed_out {
            return Err(DwimError::InterpretationTimeout {
                seconds: self.timeout_secs,
            });
        }
        if exit_code != Some(0) {
            return Err(DwimError::InterpretationFailure(format!(
                "interpreter '{}' exited with code {:?}",
                args[0], exit_code
            )));
        }

        parse_reply(&reply)
    }
}

/// Parse and validate a wire reply.
fn parse_reply(reply: &str) -> Result<Interpretation> {
    let wire: WireReply = serde_json::from_str(reply.trim()).map_err(|e| {
        DwimError::InterpretationFailure(format!("unparseable interpreter reply: {}", e))
    })?;

    match wire.outcome.as_str() {
        "act" => {
            let command = wire.command.unwrap_or_default();
            if command.trim().is_empty() {
                return Err(DwimError::InterpretationFailure(
                    "act outcome carried no command".to_string(),
                ));
            }
            Ok(Interpretation::Act(command))
        }
        "clarify" => {
            if wire.questions.is_empty() {
                return Err(DwimError::InterpretationFailure(
                    "clarify outcome carried no questions".to_string(),
                ));
            }
            Ok(Interpretation::Clarify(wire.questions))
        }
        "fail" => Ok(Interpretation::Fail(
            wire.reason
                .unwrap_or_else(|| "service declined without a reason".to_string()),
        )),
        other => Err(DwimError::InterpretationFailure(format!(
            "unknown interpreter outcome '{}'",
            other
        ))),
    }
}

/// Wait for a child process with timeout. Returns (exit_code, timed_out);
/// on timeout the child is killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool)> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok((status.code(), false));
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok((None, true));
                }
                std::thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(DwimError::InterpretationFailure(format!(
                    "failed to check interpreter status: {}",
                    e
                )));
            }
        }
    }
}

fn reply_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "dwim-reply-{}-{}.json",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ))
}
