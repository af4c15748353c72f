//! The `dwim promote` command: run the promotion analyzer.

use crate::cli::PromoteArgs;
use crate::config::Config;
use crate::error::Result;
use crate::exit_codes;
use crate::ledger;
use crate::promote::{self, PromotionCandidate, PromotionReport};
use crate::scope::ScopeContext;
use chrono::{Duration, Utc};

/// Execute the `dwim promote` command.
pub fn cmd_promote(args: PromoteArgs) -> Result<i32> {
    let ctx = ScopeContext::resolve()?;
    let config = Config::load_with_env(ctx.config_path());

    let window_days = args.window_days.unwrap_or(config.promote_window_days);
    let since = Utc::now() - Duration::days(window_days);
    let records = ledger::scan_since(&ctx.ledger_path, Some(since))?;

    let report = promote::run(&ctx, &config, records, args.dry_run)?;
    print!("{}", render_report(&report, window_days, args.dry_run));
    Ok(exit_codes::SUCCESS)
}

fn render_report(report: &PromotionReport, window_days: i64, dry_run: bool) -> String {
    let mut out = String::new();

    if dry_run {
        out.push_str(&format!(
            "Promotion (dry run, last {} days):\n",
            window_days
        ));
    } else {
        out.push_str(&format!("Promotion (last {} days):\n", window_days));
    }

    if report.materialized.is_empty()
        && report.suggested.is_empty()
        && report.skipped_existing.is_empty()
    {
        out.push_str("  nothing to promote\n");
        return out;
    }

    if !report.materialized.is_empty() {
        out.push_str("\nPromoted:\n");
        for (candidate, path) in &report.materialized {
            out.push_str(&format!(
                "  {} -> {}\n    {}\n",
                candidate.intent_key,
                path.display(),
                describe(candidate)
            ));
        }
    }

    if !report.suggested.is_empty() {
        out.push_str("\nSuggested (not written):\n");
        for candidate in &report.suggested {
            out.push_str(&format!(
                "  {} [{}]\n    {}\n",
                candidate.intent_key,
                candidate.scope,
                describe(candidate)
            ));
        }
    }

    if !report.skipped_existing.is_empty() {
        out.push_str("\nSkipped (native resolution already exists):\n");
        for candidate in &report.skipped_existing {
            out.push_str(&format!("  {}\n", candidate.intent_key));
        }
    }

    out
}

fn describe(candidate: &PromotionCandidate) -> String {
    format!(
        "action: {} (frequency {}, stability {:.0}%)",
        candidate.representative_action,
        candidate.frequency,
        candidate.stability_score * 100.0
    )
}
