//! The promotion analyzer: turning expensive resolutions into cheap ones.
//!
//! An offline pass over a ledger window groups interpretation-resolved
//! invocations by (scope, intent key) and measures how often they landed
//! on the same action. Stable, frequent mappings are materialized as
//! native resolution scripts in the matching scope's command directory;
//! frequent but unstable mappings are surfaced as suggestions only, since
//! varying actions should not be silently hard-coded.
//!
//! The analyzer holds no lock and tolerates the ledger growing while it
//! scans: it works on a snapshot window, and its only touchpoint with the
//! foreground path is the atomic script write, which lookups observe as
//! either absent or complete.

use crate::config::Config;
use crate::error::Result;
use crate::fs::{atomic_write_file, make_executable};
use crate::ledger::{Invocation, InvocationOutcome, ResolutionPath};
use crate::lookup;
use crate::scope::{Scope, ScopeContext};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A stable high-frequency intent→action mapping mined from the ledger.
///
/// Ephemeral: recomputed each analysis pass, never persisted.
#[derive(Debug, Clone)]
pub struct PromotionCandidate {
    pub intent_key: String,
    pub scope: Scope,
    /// Occurrences inside the scan window.
    pub frequency: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Modal action string across occurrences.
    pub representative_action: String,
    /// Share of occurrences whose action was byte-identical to the mode.
    pub stability_score: f64,
}

impl PromotionCandidate {
    /// Whether this candidate may be auto-materialized.
    pub fn eligible(&self, config: &Config) -> bool {
        self.frequency >= config.promote_min_frequency
            && self.stability_score >= config.promote_min_stability
            && self.scope != Scope::UpstreamUniversal
    }

    /// Frequent enough to mention, too unstable to hard-code.
    pub fn suggested_only(&self, config: &Config) -> bool {
        self.frequency >= config.promote_min_frequency && !self.eligible(config)
    }
}

/// What one analysis pass did.
#[derive(Debug, Default)]
pub struct PromotionReport {
    /// Candidates written as native resolutions, with their script paths.
    pub materialized: Vec<(PromotionCandidate, PathBuf)>,
    /// Candidates surfaced for a human, not written.
    pub suggested: Vec<PromotionCandidate>,
    /// Eligible candidates whose intent key already had a native
    /// resolution; left untouched.
    pub skipped_existing: Vec<PromotionCandidate>,
}

/// Streaming aggregate for one (scope, intent key) group.
struct Group {
    frequency: usize,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    action_counts: BTreeMap<String, usize>,
}

/// Group ledger records into promotion candidates.
///
/// Only records that went through the expensive paths count: an intent
/// already resolving natively has nothing left to learn. Records without
/// a resolved action (pending, hard failures) are excluded. Records are
/// consumed one at a time; only the per-group aggregates are held, so a
/// large ledger window never sits in memory whole.
pub fn analyze<I>(records: I) -> Vec<PromotionCandidate>
where
    I: IntoIterator<Item = Invocation>,
{
    let mut groups: BTreeMap<(Scope, String), Group> = BTreeMap::new();

    for record in records {
        let learnable = matches!(
            record.resolution_path,
            ResolutionPath::Interpretation | ResolutionPath::ClarificationCache
        ) && matches!(
            record.outcome,
            InvocationOutcome::Executed | InvocationOutcome::ClarificationResolved
        );
        if !learnable {
            continue;
        }
        let Some(action) = record.action else {
            continue;
        };

        let ts = record.ts;
        let group = groups
            .entry((record.scope, record.intent_key))
            .or_insert_with(|| Group {
                frequency: 0,
                first_seen: ts,
                last_seen: ts,
                action_counts: BTreeMap::new(),
            });
        group.frequency += 1;
        group.first_seen = group.first_seen.min(ts);
        group.last_seen = group.last_seen.max(ts);
        *group.action_counts.entry(action).or_default() += 1;
    }

    let mut candidates = Vec::new();
    for ((scope, intent_key), group) in groups {
        let Some((modal_action, modal_count)) = group
            .action_counts
            .iter()
            .max_by_key(|&(_, count)| count)
            .map(|(action, count)| (action.clone(), *count))
        else {
            continue;
        };

        candidates.push(PromotionCandidate {
            intent_key,
            scope,
            frequency: group.frequency,
            first_seen: group.first_seen,
            last_seen: group.last_seen,
            representative_action: modal_action,
            stability_score: modal_count as f64 / group.frequency as f64,
        });
    }

    candidates.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    candidates
}

/// Run one analysis pass over a ledger window scan.
///
/// Materialization is idempotent: re-running over an overlapping window
/// finds the script from the previous pass via the native lookup and
/// leaves it untouched.
pub fn run<I>(
    ctx: &ScopeContext,
    config: &Config,
    records: I,
    dry_run: bool,
) -> Result<PromotionReport>
where
    I: IntoIterator<Item = Invocation>,
{
    let mut report = PromotionReport::default();

    for candidate in analyze(records) {
        if candidate.suggested_only(config) {
            report.suggested.push(candidate);
            continue;
        }
        if !candidate.eligible(config) {
            continue;
        }

        let Some(dir) = ctx.write_dir(candidate.scope) else {
            // No writable directory for this scope from here (e.g. a
            // project-local candidate analyzed outside that project).
            report.suggested.push(candidate);
            continue;
        };

        if lookup::resolution_exists(&dir, &candidate.intent_key) {
            report.skipped_existing.push(candidate);
            continue;
        }

        if dry_run {
            report.suggested.push(candidate);
            continue;
        }

        let path = materialize(&dir, &candidate, config.promote_window_days)?;
        report.materialized.push((candidate, path));
    }

    Ok(report)
}

/// Write a candidate as an executable wrapper script, nested by word.
pub fn materialize(
    dir: &PathBuf,
    candidate: &PromotionCandidate,
    window_days: i64,
) -> Result<PathBuf> {
    let mut path = dir.clone();
    for word in candidate.intent_key.split_whitespace() {
        path.push(word);
    }

    let script = format!(
        "#!/bin/sh\n\
         # Generated by `dwim promote`. Remove this file to demote.\n\
         # intent: {key}\n\
         # created_from: promoted\n\
         # evidence: frequency={freq} stability={stab:.2} window_days={window} generated_at={ts}\n\
         exec {action} \"$@\"\n",
        key = candidate.intent_key,
        freq = candidate.frequency,
        stab = candidate.stability_score,
        window = window_days,
        ts = Utc::now().to_rfc3339(),
        action = candidate.representative_action,
    );

    atomic_write_file(&path, &script)?;
    make_executable(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{learnable_record, sandbox_context};
    use tempfile::TempDir;

    fn small_thresholds() -> Config {
        Config {
            promote_min_frequency: 3,
            promote_min_stability: 0.8,
            ..Config::default()
        }
    }

    #[test]
    fn test_analyze_groups_by_scope_and_intent() {
        let mut records = Vec::new();
        for _ in 0..4 {
            records.push(learnable_record("calendar", Scope::UserLevel, "sync"));
        }
        for _ in 0..2 {
            records.push(learnable_record("mail", Scope::UserLevel, "send"));
        }

        let candidates = analyze(records);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].intent_key, "calendar");
        assert_eq!(candidates[0].frequency, 4);
        assert_eq!(candidates[1].intent_key, "mail");
    }

    #[test]
    fn test_analyze_stability_score() {
        let mut records = Vec::new();
        for _ in 0..8 {
            records.push(learnable_record("calendar", Scope::UserLevel, "sync"));
        }
        for _ in 0..2 {
            records.push(learnable_record("calendar", Scope::UserLevel, "other"));
        }

        let candidates = analyze(records);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].frequency, 10);
        assert_eq!(candidates[0].representative_action, "sync");
        assert!((candidates[0].stability_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_excludes_native_and_failed_records() {
        let mut native = learnable_record("calendar", Scope::UserLevel, "sync");
        native.resolution_path = ResolutionPath::Native;

        let mut failed = learnable_record("calendar", Scope::UserLevel, "sync");
        failed.outcome = InvocationOutcome::Failed;

        let mut pending = learnable_record("calendar", Scope::UserLevel, "sync");
        pending.outcome = InvocationOutcome::ClarificationPending;
        pending.action = None;

        assert!(analyze([native, failed, pending]).is_empty());
    }

    #[test]
    fn test_eligibility_thresholds() {
        let config = small_thresholds();
        let records: Vec<_> = (0..3)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "sync"))
            .collect();
        let candidates = analyze(records);

        assert!(candidates[0].eligible(&config));
        assert!(!candidates[0].suggested_only(&config));
    }

    #[test]
    fn test_unstable_candidate_is_suggested_only() {
        let config = small_thresholds();
        let mut records = Vec::new();
        for action in ["a", "b", "c"] {
            records.push(learnable_record("calendar", Scope::UserLevel, action));
        }
        let candidates = analyze(records);

        assert!(!candidates[0].eligible(&config));
        assert!(candidates[0].suggested_only(&config));
    }

    #[test]
    fn test_upstream_universal_never_eligible() {
        let config = small_thresholds();
        let records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar", Scope::UpstreamUniversal, "sync"))
            .collect();
        let candidates = analyze(records);

        assert!(!candidates[0].eligible(&config));
        assert!(candidates[0].suggested_only(&config));
    }

    #[test]
    fn test_run_materializes_eligible_candidate() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = small_thresholds();
        let records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "remove-and-sync"))
            .collect();

        let report = run(&ctx, &config, records, false).unwrap();

        assert_eq!(report.materialized.len(), 1);
        let (candidate, path) = &report.materialized[0];
        assert_eq!(candidate.intent_key, "calendar");
        assert!(path.exists());
        assert!(crate::fs::is_executable_file(path));

        let script = std::fs::read_to_string(path).unwrap();
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("created_from: promoted"));
        assert!(script.contains("exec remove-and-sync \"$@\""));
    }

    #[test]
    fn test_run_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = small_thresholds();
        let records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "sync"))
            .collect();

        let first = run(&ctx, &config, records.clone(), false).unwrap();
        assert_eq!(first.materialized.len(), 1);
        let path = first.materialized[0].1.clone();
        let content_before = std::fs::read_to_string(&path).unwrap();

        let second = run(&ctx, &config, records, false).unwrap();
        assert!(second.materialized.is_empty());
        assert_eq!(second.skipped_existing.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content_before);
    }

    #[test]
    fn test_later_differing_action_does_not_alter_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = small_thresholds();

        let mut records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "sync"))
            .collect();
        let first = run(&ctx, &config, records.clone(), false).unwrap();
        let path = first.materialized[0].1.clone();
        let content_before = std::fs::read_to_string(&path).unwrap();

        records.push(learnable_record("calendar", Scope::UserLevel, "different"));
        let second = run(&ctx, &config, records, false).unwrap();

        assert!(second.materialized.is_empty());
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content_before);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = small_thresholds();
        let records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "sync"))
            .collect();

        let report = run(&ctx, &config, records, true).unwrap();

        assert!(report.materialized.is_empty());
        assert_eq!(report.suggested.len(), 1);
        assert!(!ctx.user_commands_dir().join("calendar").exists());
    }

    #[test]
    fn test_multi_word_intent_nests_by_word() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = small_thresholds();
        let records: Vec<_> = (0..5)
            .map(|_| learnable_record("calendar delete", Scope::UserLevel, "remove-and-sync"))
            .collect();

        let report = run(&ctx, &config, records, false).unwrap();

        let expected = ctx.user_commands_dir().join("calendar").join("delete");
        assert_eq!(report.materialized[0].1, expected);
        assert!(expected.exists());
    }

    #[test]
    fn test_sixty_identical_records_clear_default_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = sandbox_context(&temp_dir);
        let config = Config::default();
        let records: Vec<_> = (0..60)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "remove-and-sync"))
            .collect();

        let report = run(&ctx, &config, records, false).unwrap();

        assert_eq!(report.materialized.len(), 1);
        assert!(ctx.user_commands_dir().join("calendar").exists());
    }

    #[test]
    fn test_below_frequency_threshold_is_silent() {
        let config = small_thresholds();
        let records: Vec<_> = (0..2)
            .map(|_| learnable_record("calendar", Scope::UserLevel, "sync"))
            .collect();
        let candidates = analyze(records);

        assert!(!candidates[0].eligible(&config));
        assert!(!candidates[0].suggested_only(&config));
    }
}
