//! Exit code constants for the dwim CLI.
//!
//! Callers (especially non-interactive agents) branch on these codes:
//! - 0: Resolved action executed successfully
//! - 1: User error (bad args, invalid state)
//! - 2: Interpretation service failed or timed out
//! - 3: Clarification pending (not a failure; answer with `dwim retry`)
//! - 4: Clarification token not found
//! - 5: Clarification token expired
//! - 6: Clarification token already resolved
//!
//! When a resolved action runs and exits non-zero, its exit code is
//! propagated unchanged rather than mapped to one of these.

/// Resolved action executed successfully.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid state.
pub const USER_ERROR: i32 = 1;

/// Interpretation service declined, errored, or timed out.
pub const INTERPRETATION_FAILURE: i32 = 2;

/// Invocation is suspended awaiting clarification answers.
pub const CLARIFICATION_PENDING: i32 = 3;

/// Retry referenced a token that does not exist.
pub const TOKEN_NOT_FOUND: i32 = 4;

/// Retry referenced a token past its expiry.
pub const TOKEN_EXPIRED: i32 = 5;

/// Retry referenced a token whose answers were already attached.
pub const TOKEN_ALREADY_RESOLVED: i32 = 6;
