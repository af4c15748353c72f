//! The native lookup chain: the cheap resolution path.
//!
//! A native resolution is any executable file in a scope's command
//! directory; presence plus the executable bit is the sole discovery
//! mechanism, so promoted scripts and hand-written ones are found the
//! same way. Two layouts are recognized:
//!
//! - nested by word: `commands/calendar/delete`
//! - flat, hyphen-joined: `commands/calendar-delete`
//!
//! Lookup is a read-only probe. A miss is not an error; it signals
//! fallthrough to the clarification cache and then the interpretation
//! gateway.

use crate::fs::is_executable_file;
use crate::scope::{Scope, ScopeContext};
use std::path::PathBuf;

/// Longest intent prefix considered during lookup.
pub const MAX_INTENT_WORDS: usize = 4;

/// An executable action bound to an intent key within one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeResolution {
    /// Normalized intent key the executable is bound to.
    pub intent_key: String,

    /// Scope whose directory the executable was found in.
    pub scope: Scope,

    /// Path to the executable.
    pub path: PathBuf,

    /// Number of argv words the key covers; the rest are passed through
    /// as arguments.
    pub matched_words: usize,
}

/// Normalize the first `words` argv entries into an intent key.
pub fn intent_key(argv: &[String], words: usize) -> String {
    argv.iter()
        .take(words)
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search the scope-ordered command directories for a native resolution.
///
/// Project-local wins over user-level regardless of prefix length;
/// within a directory the longest matching prefix wins, so
/// `calendar delete` beats `calendar`. Upstream-universal is never
/// probed at runtime.
pub fn find_native(ctx: &ScopeContext, argv: &[String]) -> Option<NativeResolution> {
    if argv.is_empty() {
        return None;
    }

    for (scope, dir) in ctx.command_dirs() {
        let max_words = argv.len().min(MAX_INTENT_WORDS);
        for words in (1..=max_words).rev() {
            let normalized: Vec<String> =
                argv.iter().take(words).map(|w| w.to_lowercase()).collect();

            let mut nested = dir.clone();
            for word in &normalized {
                nested.push(word);
            }
            let flat = dir.join(normalized.join("-"));

            for candidate in [nested, flat] {
                if is_executable_file(&candidate) {
                    return Some(NativeResolution {
                        intent_key: normalized.join(" "),
                        scope,
                        path: candidate,
                        matched_words: words,
                    });
                }
            }
        }
    }

    None
}

/// Check whether any native resolution already exists for an intent key
/// in a command directory. Used by the promotion analyzer to keep
/// materialization idempotent.
pub fn resolution_exists(dir: &PathBuf, intent_key: &str) -> bool {
    let words: Vec<&str> = intent_key.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let mut nested = dir.clone();
    for word in &words {
        nested.push(word);
    }
    let flat = dir.join(words.join("-"));

    is_executable_file(&nested) || is_executable_file(&flat)
}
