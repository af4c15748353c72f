//! The `dwim usage` command: a summary report over the ledger.
//!
//! Records stream out of the ledger scan and fold into counters, so the
//! report costs one pass and holds only the aggregates.

use crate::cli::UsageArgs;
use crate::error::Result;
use crate::exit_codes;
use crate::ledger::{self, Invocation};
use crate::scope::ScopeContext;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;

/// Intent keys shown in the report's top section.
const TOP_INTENTS: usize = 10;

/// Execute the `dwim usage` command.
pub fn cmd_usage(args: UsageArgs) -> Result<i32> {
    let ctx = ScopeContext::resolve()?;
    let since = args.since_days.map(|days| Utc::now() - Duration::days(days));
    let summary = summarize(ledger::scan_since(&ctx.ledger_path, since)?);

    print!("{}", render_report(&summary, args.since_days));
    Ok(exit_codes::SUCCESS)
}

/// Aggregated counters for a scan window.
struct UsageSummary {
    total: usize,
    by_outcome: BTreeMap<String, usize>,
    by_path: BTreeMap<String, usize>,
    by_intent: BTreeMap<String, usize>,
}

/// Fold a record stream into counters.
fn summarize<I>(records: I) -> UsageSummary
where
    I: IntoIterator<Item = Invocation>,
{
    let mut summary = UsageSummary {
        total: 0,
        by_outcome: BTreeMap::new(),
        by_path: BTreeMap::new(),
        by_intent: BTreeMap::new(),
    };

    for record in records {
        summary.total += 1;
        *summary
            .by_outcome
            .entry(record.outcome.to_string())
            .or_default() += 1;
        *summary
            .by_path
            .entry(record.resolution_path.to_string())
            .or_default() += 1;
        *summary.by_intent.entry(record.intent_key).or_default() += 1;
    }

    summary
}

/// Render the usage report as text.
fn render_report(summary: &UsageSummary, since_days: Option<i64>) -> String {
    let mut out = String::new();

    match since_days {
        Some(days) => out.push_str(&format!(
            "Usage: {} invocations in the last {} days\n",
            summary.total, days
        )),
        None => out.push_str(&format!("Usage: {} invocations\n", summary.total)),
    }
    if summary.total == 0 {
        return out;
    }

    out.push_str("\nBy outcome:\n");
    for (outcome, count) in &summary.by_outcome {
        out.push_str(&format!("  {:<24} {}\n", outcome, count));
    }

    out.push_str("\nBy resolution path:\n");
    for (path, count) in &summary.by_path {
        out.push_str(&format!("  {:<24} {}\n", path, count));
    }

    let mut intents: Vec<(&str, usize)> = summary
        .by_intent
        .iter()
        .map(|(intent, count)| (intent.as_str(), *count))
        .collect();
    intents.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    out.push_str("\nTop intents:\n");
    for (intent, count) in intents.into_iter().take(TOP_INTENTS) {
        out.push_str(&format!("  {:<24} {}\n", intent, count));
    }

    out
}
