//! The usage ledger: append-only record of every invocation.
//!
//! Records are stored in NDJSON format (one field-tagged JSON object per
//! line) so schema additions do not break older readers. The ledger is
//! the single source of truth for the promotion analyzer; no record is
//! ever mutated or deleted by normal operation.
//!
//! # Concurrency
//!
//! Invocations are independent processes with no coordinator. Each append
//! is a single `write` to a file opened in append mode, so concurrent
//! writers produce whole, individually parseable lines. Ordering across
//! records is by timestamp with pid as tie-break and must be treated as
//! approximate under clock skew.
//!
//! # Degraded mode
//!
//! Logging is best-effort relative to execution: an append failure (disk
//! full, permissions) is surfaced as a stderr warning and never blocks or
//! fails the invocation's primary action.

use crate::error::{DwimError, Result};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// How an invocation's intent was resolved to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// An executable in a scope's command directory matched the intent.
    Native,
    /// A previously clarified (intent, answers) mapping was reused.
    ClarificationCache,
    /// The interpretation service produced the action.
    Interpretation,
    /// No stage produced an action (failed or still pending).
    Unresolved,
}

impl std::fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionPath::Native => write!(f, "native"),
            ResolutionPath::ClarificationCache => write!(f, "clarification_cache"),
            ResolutionPath::Interpretation => write!(f, "interpretation"),
            ResolutionPath::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Terminal state of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// The resolved action ran and exited zero.
    Executed,
    /// A clarification request was persisted; the caller must retry
    /// with answers.
    ClarificationPending,
    /// A retry attached answers and the resolved action ran successfully.
    ClarificationResolved,
    /// Resolution or execution failed.
    Failed,
}

impl std::fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationOutcome::Executed => write!(f, "executed"),
            InvocationOutcome::ClarificationPending => write!(f, "clarification_pending"),
            InvocationOutcome::ClarificationResolved => write!(f, "clarification_resolved"),
            InvocationOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// One ledger record, immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique id for this invocation.
    pub id: String,

    /// RFC3339 timestamp when dispatch started.
    pub ts: DateTime<Utc>,

    /// Process id of the invocation; tie-break for ordering.
    pub pid: u32,

    /// `user@host` that ran the invocation.
    pub actor: String,

    /// Working directory the invocation ran from.
    pub cwd: PathBuf,

    /// Repository identity (remote URL), when inside a repo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_identity: Option<String>,

    /// Raw argument words as given by the caller.
    pub argv: Vec<String>,

    /// Normalized intent key used for lookup and learning.
    pub intent_key: String,

    /// Scope the invocation resolved in.
    pub scope: Scope,

    /// Stage that produced the action.
    pub resolution_path: ResolutionPath,

    /// Terminal state.
    pub outcome: InvocationOutcome,

    /// Resolved action command string, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Wall-clock duration of the whole dispatch in milliseconds.
    pub duration_ms: u64,
}

impl Invocation {
    /// Create a record at dispatch start. The outcome fields carry
    /// placeholder values until [`Invocation::finished`] fills them.
    pub fn begin(
        argv: Vec<String>,
        intent_key: String,
        scope: Scope,
        cwd: PathBuf,
        repo_identity: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            ts: Utc::now(),
            pid: std::process::id(),
            actor: actor_string(),
            cwd,
            repo_identity,
            argv,
            intent_key,
            scope,
            resolution_path: ResolutionPath::Unresolved,
            outcome: InvocationOutcome::Failed,
            action: None,
            duration_ms: 0,
        }
    }

    /// Record how the intent was resolved.
    pub fn resolved(mut self, path: ResolutionPath, action: Option<String>) -> Self {
        self.resolution_path = path;
        self.action = action;
        self
    }

    /// Record the intent key a lookup actually matched (it may cover more
    /// words than the initial first-token guess).
    pub fn with_intent_key(mut self, intent_key: impl Into<String>) -> Self {
        self.intent_key = intent_key.into();
        self
    }

    /// Finalize the record with its outcome and duration.
    pub fn finished(mut self, outcome: InvocationOutcome, started: Instant) -> Self {
        self.outcome = outcome;
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }

    /// Serialize to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            DwimError::LedgerWriteFailure(format!("failed to serialize record: {}", e))
        })
    }
}

/// Get the actor string (`user@host`) for ledger records.
fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append a record to the ledger.
///
/// The line is written with a single `write` call against a file opened
/// in append mode, then synced, so concurrent independent invocations
/// each produce a whole line.
pub fn append(ledger_path: &Path, invocation: &Invocation) -> Result<()> {
    let line = invocation.to_ndjson_line()?;

    if let Some(parent) = ledger_path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            DwimError::LedgerWriteFailure(format!(
                "failed to create ledger directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path)
        .map_err(|e| {
            DwimError::LedgerWriteFailure(format!(
                "failed to open ledger '{}': {}",
                ledger_path.display(),
                e
            ))
        })?;

    let mut buf = line.into_bytes();
    buf.push(b'\n');
    file.write_all(&buf).map_err(|e| {
        DwimError::LedgerWriteFailure(format!(
            "failed to write to ledger '{}': {}",
            ledger_path.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        DwimError::LedgerWriteFailure(format!(
            "failed to sync ledger '{}': {}",
            ledger_path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Append a record, downgrading failure to a stderr warning.
pub fn append_best_effort(ledger_path: &Path, invocation: &Invocation) {
    if let Err(e) = append(ledger_path, invocation) {
        eprintln!("Warning: {}", e);
    }
}

/// Lazy scan over ledger records at or after a cursor timestamp.
///
/// Records are read one line at a time, so a large ledger is never held
/// in memory. The scan is restartable: rerun [`scan_since`] with the
/// same cursor to read the window again.
pub struct LedgerScan {
    lines: Option<std::io::Lines<BufReader<fs::File>>>,
    since: Option<DateTime<Utc>>,
}

impl Iterator for LedgerScan {
    type Item = Invocation;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        loop {
            let line = match lines.next()? {
                Ok(line) => line,
                // A mid-scan read error ends the scan; the timestamp
                // cursor makes a rerun cheap.
                Err(_) => return None,
            };
            if line.trim().is_empty() {
                continue;
            }
            let Ok(record) = serde_json::from_str::<Invocation>(&line) else {
                continue;
            };
            if let Some(cursor) = self.since
                && record.ts < cursor
            {
                continue;
            }
            return Some(record);
        }
    }
}

/// Scan ledger records at or after the cursor timestamp.
///
/// A missing ledger yields an empty scan. Unparseable lines are
/// skipped; the analyzer treats ordering as approximate, so a torn tail
/// line from a crashed writer only costs that one record.
pub fn scan_since(
    ledger_path: &Path,
    since: Option<DateTime<Utc>>,
) -> Result<LedgerScan> {
    let file = match fs::File::open(ledger_path) {
        Ok(file) => Some(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(DwimError::UserError(format!(
                "failed to open ledger '{}': {}",
                ledger_path.display(),
                e
            )));
        }
    };

    Ok(LedgerScan {
        lines: file.map(|file| BufReader::new(file).lines()),
        since,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample_invocation(argv: &[&str]) -> Invocation {
        Invocation::begin(
            argv.iter().map(|s| s.to_string()).collect(),
            argv.first().unwrap_or(&"").to_lowercase(),
            Scope::UserLevel,
            PathBuf::from("/tmp"),
            None,
        )
    }

    #[test]
    fn test_begin_sets_identity_fields() {
        let inv = sample_invocation(&["calendar", "delete"]);

        assert!(!inv.id.is_empty());
        assert_eq!(inv.pid, std::process::id());
        assert!(inv.actor.contains('@'));
        assert_eq!(inv.argv, vec!["calendar", "delete"]);
        assert_eq!(inv.intent_key, "calendar");
        assert_eq!(inv.resolution_path, ResolutionPath::Unresolved);
        assert_eq!(inv.outcome, InvocationOutcome::Failed);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = sample_invocation(&["x"]);
        let b = sample_invocation(&["x"]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_finished_fills_outcome_and_duration() {
        let started = Instant::now();
        let inv = sample_invocation(&["calendar"])
            .resolved(ResolutionPath::Native, Some("cal-cli".to_string()))
            .finished(InvocationOutcome::Executed, started);

        assert_eq!(inv.outcome, InvocationOutcome::Executed);
        assert_eq!(inv.resolution_path, ResolutionPath::Native);
        assert_eq!(inv.action, Some("cal-cli".to_string()));
    }

    #[test]
    fn test_ndjson_line_is_single_line_and_field_tagged() {
        let inv = sample_invocation(&["calendar", "delete", "Test event"]);
        let line = inv.to_ndjson_line().unwrap();

        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(value.get("argv").is_some());
        assert!(value.get("ts").is_some());
        assert!(value.get("outcome").is_some());
        // Absent optionals are omitted entirely.
        assert!(value.get("repo_identity").is_none());
        assert!(value.get("action").is_none());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let inv = sample_invocation(&["x"])
            .finished(InvocationOutcome::ClarificationPending, Instant::now());
        let line = inv.to_ndjson_line().unwrap();
        assert!(line.contains("\"clarification_pending\""));
    }

    #[test]
    fn test_append_creates_file_and_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger").join("ledger.ndjson");

        append(&ledger_path, &sample_invocation(&["calendar"])).unwrap();

        assert!(ledger_path.exists());
        let content = fs::read_to_string(&ledger_path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_append_accumulates_records() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger.ndjson");

        append(&ledger_path, &sample_invocation(&["a"])).unwrap();
        append(&ledger_path, &sample_invocation(&["b"])).unwrap();

        let records: Vec<_> = scan_since(&ledger_path, None).unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].argv, vec!["a"]);
        assert_eq!(records[1].argv, vec!["b"]);
    }

    #[test]
    fn test_scan_since_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut records = scan_since(&temp_dir.path().join("none.ndjson"), None).unwrap();
        assert!(records.next().is_none());
    }

    #[test]
    fn test_scan_since_applies_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger.ndjson");

        let mut old = sample_invocation(&["old"]);
        old.ts = Utc::now() - Duration::days(10);
        append(&ledger_path, &old).unwrap();
        append(&ledger_path, &sample_invocation(&["new"])).unwrap();

        let cursor = Utc::now() - Duration::days(1);
        let records: Vec<_> = scan_since(&ledger_path, Some(cursor)).unwrap().collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].argv, vec!["new"]);
    }

    #[test]
    fn test_scan_is_lazy_and_restartable() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger.ndjson");

        for name in ["a", "b", "c"] {
            append(&ledger_path, &sample_invocation(&[name])).unwrap();
        }

        // Pulling one record does not require reading the rest.
        let mut scan = scan_since(&ledger_path, None).unwrap();
        let first = scan.next().unwrap();
        assert_eq!(first.argv, vec!["a"]);
        drop(scan);

        // An abandoned scan restarts cleanly from the same cursor.
        let records: Vec<_> = scan_since(&ledger_path, None).unwrap().collect();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_scan_skips_corrupt_lines() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger.ndjson");

        append(&ledger_path, &sample_invocation(&["good"])).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&ledger_path)
                .unwrap();
            writeln!(file, "{{\"torn\": ").unwrap();
        }
        append(&ledger_path, &sample_invocation(&["also-good"])).unwrap();

        let records: Vec<_> = scan_since(&ledger_path, None).unwrap().collect();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_concurrent_appends_produce_whole_records() {
        let temp_dir = TempDir::new().unwrap();
        let ledger_path = temp_dir.path().join("ledger.ndjson");
        // The file must exist before the threads race to open it.
        append(&ledger_path, &sample_invocation(&["seed"])).unwrap();

        let n = 16;
        let handles: Vec<_> = (0..n)
            .map(|i| {
                let path = ledger_path.clone();
                std::thread::spawn(move || {
                    let inv = sample_invocation(&[&format!("intent-{}", i)]);
                    append(&path, &inv).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records: Vec<_> = scan_since(&ledger_path, None).unwrap().collect();
        assert_eq!(records.len(), n + 1);

        // Every line must parse individually; no interleaving corruption.
        let content = fs::read_to_string(&ledger_path).unwrap();
        for line in content.lines() {
            serde_json::from_str::<Invocation>(line).unwrap();
        }
    }

    #[test]
    fn test_append_best_effort_swallows_failure() {
        // A directory as the ledger path forces the open to fail.
        let temp_dir = TempDir::new().unwrap();
        append_best_effort(temp_dir.path(), &sample_invocation(&["x"]));
    }

    #[test]
    fn test_record_roundtrip_preserves_fields() {
        let inv = sample_invocation(&["calendar", "delete", "Test event"])
            .resolved(
                ResolutionPath::Interpretation,
                Some("remove-and-sync".to_string()),
            )
            .finished(InvocationOutcome::Executed, Instant::now());

        let line = inv.to_ndjson_line().unwrap();
        let back: Invocation = serde_json::from_str(&line).unwrap();

        assert_eq!(back.id, inv.id);
        assert_eq!(back.argv, inv.argv);
        assert_eq!(back.resolution_path, ResolutionPath::Interpretation);
        assert_eq!(back.outcome, InvocationOutcome::Executed);
        assert_eq!(back.action, Some("remove-and-sync".to_string()));
    }
}
