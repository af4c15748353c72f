//! The dispatch orchestrator: the default `dwim <intent words...>` path.
//!
//! Stages run strictly cheapest-first, and the first hit is terminal:
//!
//! 1. native lookup across the scope-ordered command directories,
//! 2. the clarification cache keyed by the exact argv,
//! 3. the interpretation gateway.
//!
//! A native hit never consults the gateway, so an intent with a native
//! resolution keeps working while the interpretation service is down.
//! Every invocation appends one ledger record, whatever its outcome.

use crate::clarify;
use crate::commands::{announce_pending, finish_execution, finish_pending};
use crate::config::Config;
use crate::error::{DwimError, Result};
use crate::exec;
use crate::interpret::{CommandInterpreter, InterpretRequest, Interpretation, Interpreter};
use crate::ledger::{self, Invocation, InvocationOutcome, ResolutionPath};
use crate::lookup;
use crate::scope::ScopeContext;
use std::time::Instant;

/// Execute the `dwim <intent words...>` command.
pub fn cmd_dispatch(intent: Vec<String>) -> Result<i32> {
    if intent.is_empty() {
        return Err(DwimError::UserError(
            "no intent given\nUsage: dwim <intent words...>".to_string(),
        ));
    }

    let ctx = ScopeContext::resolve()?;
    let config = Config::load_with_env(ctx.config_path());
    let interpreter = CommandInterpreter::from_config(&config);

    run_dispatch(&ctx, &config, &interpreter, intent)
}

/// Dispatch with explicit context, config, and interpreter.
pub(crate) fn run_dispatch(
    ctx: &ScopeContext,
    config: &Config,
    interpreter: &dyn Interpreter,
    argv: Vec<String>,
) -> Result<i32> {
    let started = Instant::now();
    let intent_key = lookup::intent_key(&argv, 1);
    let invocation = Invocation::begin(
        argv.clone(),
        intent_key.clone(),
        ctx.scope,
        ctx.cwd.clone(),
        ctx.repo_identity.clone(),
    );

    // Stage 1: native lookup.
    if let Some(hit) = lookup::find_native(ctx, &argv) {
        let invocation = invocation.with_intent_key(hit.intent_key.clone());
        let result = exec::run_native(&hit, &argv, &ctx.cwd);
        return finish_execution(
            ctx,
            invocation,
            ResolutionPath::Native,
            Some(hit.path.display().to_string()),
            result,
            InvocationOutcome::Executed,
            started,
        );
    }

    // Stage 2: clarification cache, keyed by the exact argv.
    if let Some(action) = clarify::lookup_cached_by_argv(&ctx.resolution_cache_path(), &argv) {
        let result = exec::run_action(&action, &ctx.cwd);
        return finish_execution(
            ctx,
            invocation,
            ResolutionPath::ClarificationCache,
            Some(action),
            result,
            InvocationOutcome::Executed,
            started,
        );
    }

    // Stage 3: the interpretation gateway.
    let request = InterpretRequest {
        argv: &argv,
        intent_key: &intent_key,
        scope: ctx.scope,
        cwd: &ctx.cwd,
        answers: None,
    };

    match interpreter.interpret(&request) {
        Ok(Interpretation::Act(action)) => {
            let result = exec::run_action(&action, &ctx.cwd);
            finish_execution(
                ctx,
                invocation,
                ResolutionPath::Interpretation,
                Some(action),
                result,
                InvocationOutcome::Executed,
                started,
            )
        }
        Ok(Interpretation::Clarify(questions)) => {
            let request = clarify::create(
                &ctx.clarifications_dir(),
                &invocation.id,
                &intent_key,
                &argv,
                questions,
                config.token_ttl_minutes,
            )?;
            announce_pending(&request);
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
