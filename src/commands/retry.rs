//! The `dwim retry <token> <answers...>` command.
//!
//! Resumes a pending clarification from its token file. Answers are
//! matched to questions positionally, or addressed explicitly as
//! `N=answer` (1-based); both forms may be mixed. The resolved (intent,
//! answers) mapping is cached so future invocations skip clarification.

use crate::clarify::{self, CachedResolution};
use crate::cli::RetryArgs;
use crate::commands::{announce_pending, finish_execution, finish_pending};
use crate::config::Config;
use crate::error::{DwimError, Result};
use crate::exec;
use crate::interpret::{CommandInterpreter, InterpretRequest, Interpretation, Interpreter};
use crate::ledger::{self, Invocation, InvocationOutcome, ResolutionPath};
use crate::scope::ScopeContext;
use chrono::Utc;
use std::time::Instant;

/// Execute the `dwim retry` command.
pub fn cmd_retry(args: RetryArgs) -> Result<i32> {
    let ctx = ScopeContext::resolve()?;
    let config = Config::load_with_env(ctx.config_path());
    let interpreter = CommandInterpreter::from_config(&config);

    run_retry(&ctx, &config, &interpreter, &args.token, &args.answers)
}

/// Retry with explicit context, config, and interpreter.
pub(crate) fn run_retry(
    ctx: &ScopeContext,
    config: &Config,
    interpreter: &dyn Interpreter,
    token: &str,
    raw_answers: &[String],
) -> Result<i32> {
    let started = Instant::now();
    let dir = ctx.clarifications_dir();

    // Token validity is checked before answer shape, so an expired token
    // reports expiry even when the answers are also malformed.
    let request = clarify::load_answerable(&dir, token, Utc::now())?;
    let answers = parse_answers(raw_answers, request.questions.len())?;
    let answers = clarify::normalize_answers(&answers);

    let invocation = Invocation::begin(
        request.argv.clone(),
        request.intent_key.clone(),
        ctx.scope,
        ctx.cwd.clone(),
        ctx.repo_identity.clone(),
    );

    // A previously clarified identical (intent, answers) pair resolves
    // from the cache without another interpretation call.
    let cache_path = ctx.resolution_cache_path();
    if let Some(action) =
        clarify::lookup_cached_by_intent_and_answers(&cache_path, &request.intent_key, &answers)
    {
        let result = exec::run_action(&action, &ctx.cwd);
        // The token is consumed only once the action has spawned; a
        // spawn failure leaves it answerable for another attempt.
        if result.is_ok() {
            clarify::attach_answers(&dir, token, &answers, Utc::now())?;
        }
        return finish_execution(
            ctx,
            invocation,
            ResolutionPath::ClarificationCache,
            Some(action),
            result,
            InvocationOutcome::ClarificationResolved,
            started,
        );
    }

    let interpret_request = InterpretRequest {
        argv: &request.argv,
        intent_key: &request.intent_key,
        scope: ctx.scope,
        cwd: &ctx.cwd,
        answers: Some(&answers),
    };

    match interpreter.interpret(&interpret_request) {
        Ok(Interpretation::Act(action)) => {
            let result = exec::run_action(&action, &ctx.cwd);
            // The token is consumed and the mapping cached only once the
            // action has spawned; a spawn failure leaves the token
            // answerable and the cache untouched.
            if result.is_ok() {
                clarify::attach_answers(&dir, token, &answers, Utc::now())?;
                clarify::cache_resolution(
                    &cache_path,
                    &CachedResolution {
                        intent_key: request.intent_key.clone(),
                        argv: request.argv.clone(),
                        answers: answers.clone(),
                        action: action.clone(),
                        cached_at: Utc::now(),
                    },
                )?;
            }
            finish_execution(
                ctx,
                invocation,
                ResolutionPath::Interpretation,
                Some(action),
                result,
                InvocationOutcome::ClarificationResolved,
                started,
            )
        }
        Ok(Interpretation::Clarify(questions)) => {
            // The answers narrowed but did not settle the intent; the
            // original token stays pending and a follow-up is issued.
            let follow_up = clarify::create(
                &dir,
                &invocation.id,
                &request.intent_key,
                &request.argv,
                questions,
                config.token_ttl_minutes,
            )?;
            announce_pending(&follow_up);
            finish_pending(ctx, invocation, started)
        }
        Ok(Interpretation::Fail(reason)) => {
            let record = invocation
                .resolved(ResolutionPath::Unresolved, None)
                .finished(InvocationOutcome::Failed, started);
            ledger::append_best_effort(&ctx.ledger_path, &record);
            Err(DwimError::InterpretationFailure(reason))
        }
        Err(e) => {
            let record = invocation
                .resolved(ResolutionPath::Unresolved, None)
                .finished(InvocationOutcome::Failed, started);
            ledger::append_best_effort(&ctx.ledger_path, &record);
            Err(e)
        }
    }
}

/// Match raw answer words to question slots.
///
/// `N=value` fills question N (1-based); anything else fills the next
/// open slot in order. Every question must end up answered exactly once.
fn parse_answers(raw: &[String], expected: usize) -> Result<Vec<String>> {
    if raw.len() > expected {
        return Err(DwimError::UserError(format!(
            "got {} answers for {} questions",
            raw.len(),
            expected
        )));
    }

    let mut slots: Vec<Option<String>> = vec![None; expected];
    let mut next_free = 0usize;

    for item in raw {
        if let Some((index, value)) = item.split_once('=')
            && let Ok(index) = index.trim().parse::<usize>()
            && (1..=expected).contains(&index)
        {
            if slots[index - 1].is_some() {
                return Err(DwimError::UserError(format!(
                    "duplicate answer for question {}",
                    index
                )));
            }
            slots[index - 1] = Some(value.to_string());
            continue;
        }

        while next_free < expected && slots[next_free].is_some() {
            next_free += 1;
        }
        if next_free >= expected {
            return Err(DwimError::UserError(format!(
                "got more answers than the {} questions asked",
                expected
            )));
        }
        slots[next_free] = Some(item.clone());
        next_free += 1;
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| {
                DwimError::UserError(format!("missing answer for question {}", i + 1))
            })
        })
        .collect()
}
