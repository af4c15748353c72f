//! The clarification store: the async question/answer protocol.
//!
//! A non-interactive caller cannot answer a prompt synchronously, so an
//! ambiguous invocation persists its question set under a fresh token and
//! terminates; a wholly separate `dwim retry <token> <answers...>`
//! invocation resumes it. No in-memory continuation exists — the request
//! file is the only state.
//!
//! Resolved (intent, answers) mappings are appended to an NDJSON cache so
//! a future invocation with the same intent and answers skips
//! clarification entirely. Answer matching is exact text after trimming,
//! compared in question order; semantic equivalence is the interpretation
//! service's job.

use crate::error::{DwimError, Result};
use crate::fs::atomic_write_file;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// A pending or resolved clarification request, one JSON file per token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Unique token addressing this request.
    pub token: String,

    /// Id of the invocation that triggered the clarification.
    pub original_invocation_id: String,

    /// Intent key of the original invocation.
    pub intent_key: String,

    /// Full argv of the original invocation.
    pub argv: Vec<String>,

    /// Ordered questions the service asked.
    pub questions: Vec<String>,

    /// When the request was created.
    pub created_at: DateTime<Utc>,

    /// When the token stops being answerable.
    pub expires_at: DateTime<Utc>,

    /// Answers, once attached. Set exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_answers: Option<Vec<String>>,
}

/// A resolved (intent, answers) → action mapping in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResolution {
    /// Intent key of the clarified invocation.
    pub intent_key: String,

    /// Original argv, so byte-identical re-invocations can hit the cache
    /// without carrying answers.
    pub argv: Vec<String>,

    /// Trimmed answers in question order.
    pub answers: Vec<String>,

    /// Resolved action command string.
    pub action: String,

    /// When the mapping was cached.
    pub cached_at: DateTime<Utc>,
}

/// Persist a new clarification request and return it.
///
/// The token is freshly generated; tokens are never reused across
/// different original intents.
pub fn create(
    dir: &Path,
    original_invocation_id: &str,
    intent_key: &str,
    argv: &[String],
    questions: Vec<String>,
    ttl_minutes: i64,
) -> Result<ClarificationRequest> {
    let now = Utc::now();
    let request = ClarificationRequest {
        token: uuid::Uuid::new_v4().simple().to_string(),
        original_invocation_id: original_invocation_id.to_string(),
        intent_key: intent_key.to_string(),
        argv: argv.to_vec(),
        questions,
        created_at: now,
        expires_at: now + Duration::minutes(ttl_minutes),
        resolved_answers: None,
    };

    write_request(dir, &request)?;
    Ok(request)
}

/// Load a request and check it is still answerable.
///
/// Distinguishes the three failure shapes so the caller can give an
/// accurate message and exit code: not found, expired, already resolved.
pub fn load_answerable(
    dir: &Path,
    token: &str,
    now: DateTime<Utc>,
) -> Result<ClarificationRequest> {
    let path = request_path(dir, token);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DwimError::TokenNotFound(token.to_string()));
        }
        Err(e) => {
            return Err(DwimError::UserError(format!(
                "failed to read clarification request '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let request: ClarificationRequest = serde_json::from_str(&content).map_err(|e| {
        DwimError::UserError(format!(
            "failed to parse clarification request '{}': {}",
            path.display(),
            e
        ))
    })?;

    if request.resolved_answers.is_some() {
        return Err(DwimError::TokenAlreadyResolved(token.to_string()));
    }
    if now > request.expires_at {
        return Err(DwimError::TokenExpired(token.to_string()));
    }

    Ok(request)
}

/// Attach answers to a pending request. The one permitted mutation.
pub fn attach_answers(
    dir: &Path,
    token: &str,
    answers: &[String],
    now: DateTime<Utc>,
) -> Result<ClarificationRequest> {
    let mut request = load_answerable(dir, token, now)?;
    request.resolved_answers = Some(normalize_answers(answers));
    write_request(dir, &request)?;
    Ok(request)
}

/// Append a resolved mapping to the cache.
pub fn cache_resolution(cache_path: &Path, entry: &CachedResolution) -> Result<()> {
    let line = serde_json::to_string(entry).map_err(|e| {
        DwimError::UserError(format!("failed to serialize cache entry: {}", e))
    })?;

    if let Some(parent) = cache_path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            DwimError::UserError(format!(
                "failed to create cache directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(cache_path)
        .map_err(|e| {
            DwimError::UserError(format!(
                "failed to open cache '{}': {}",
                cache_path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", line).map_err(|e| {
        DwimError::UserError(format!(
            "failed to write cache '{}': {}",
            cache_path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Look up a cached action by intent key and answers. Last match wins.
pub fn lookup_cached_by_intent_and_answers(
    cache_path: &Path,
    intent_key: &str,
    answers: &[String],
) -> Option<String> {
    let wanted = normalize_answers(answers);
    scan_cache(cache_path, |entry| {
        entry.intent_key == intent_key && entry.answers == wanted
    })
}

/// Look up a cached action by the original argv. Last match wins.
pub fn lookup_cached_by_argv(cache_path: &Path, argv: &[String]) -> Option<String> {
    scan_cache(cache_path, |entry| entry.argv == argv)
}

fn scan_cache<F>(cache_path: &Path, matches: F) -> Option<String>
where
    F: Fn(&CachedResolution) -> bool,
{
    let file = fs::File::open(cache_path).ok()?;
    let mut found = None;
    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        let Ok(entry) = serde_json::from_str::<CachedResolution>(&line) else {
            continue;
        };
        if matches(&entry) {
            found = Some(entry.action);
        }
    }
    found
}

/// Trim whitespace from each answer; comparison is in question order.
pub fn normalize_answers(answers: &[String]) -> Vec<String> {
    answers.iter().map(|a| a.trim().to_string()).collect()
}

fn request_path(dir: &Path, token: &str) -> std::path::PathBuf {
    dir.join(format!("{}.json", token))
}

fn write_request(dir: &Path, request: &ClarificationRequest) -> Result<()> {
    let content = serde_json::to_string_pretty(request).map_err(|e| {
        DwimError::UserError(format!(
            "failed to serialize clarification request: {}",
            e
        ))
    })?;
    atomic_write_file(request_path(dir, &request.token), &content)
}
