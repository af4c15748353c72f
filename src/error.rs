//! Error types for the dwim CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Resolution misses and pending clarifications are not modeled here: a miss
//! falls through to the next resolution stage, and a pending clarification is
//! an expected terminal state reported with its own exit code by the
//! dispatch path.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for dwim operations.
///
/// Each variant maps to a specific exit code so that agent callers can
/// branch on "needs more info" vs. "failed" without parsing messages.
#[derive(Error, Debug)]
pub enum DwimError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// The interpretation service declined or errored.
    #[error("interpretation failed: {0}")]
    InterpretationFailure(String),

    /// The interpretation service did not reply within the timeout.
    #[error("interpretation timed out after {seconds}s")]
    InterpretationTimeout { seconds: u64 },

    /// A retry referenced a token with no stored clarification request.
    #[error("clarification token '{0}' not found")]
    TokenNotFound(String),

    /// A retry referenced a token past its expiry.
    #[error("clarification token '{0}' has expired")]
    TokenExpired(String),

    /// A retry referenced a token whose answers were already attached.
    #[error("clarification token '{0}' was already resolved")]
    TokenAlreadyResolved(String),

    /// A resolved action could not be spawned at all. A spawned action
    /// that exits non-zero is not an error; its code is propagated.
    #[error("{0}")]
    ExecutionFailure(String),

    /// The usage ledger could not be written. Never blocks the primary
    /// action; surfaced as a warning by the best-effort append path.
    #[error("ledger write failed: {0}")]
    LedgerWriteFailure(String),
}

impl DwimError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DwimError::UserError(_) => exit_codes::USER_ERROR,
            DwimError::InterpretationFailure(_) => exit_codes::INTERPRETATION_FAILURE,
            DwimError::InterpretationTimeout { .. } => exit_codes::INTERPRETATION_FAILURE,
            DwimError::TokenNotFound(_) => exit_codes::TOKEN_NOT_FOUND,
            DwimError::TokenExpired(_) => exit_codes::TOKEN_EXPIRED,
            DwimError::TokenAlreadyResolved(_) => exit_codes::TOKEN_ALREADY_RESOLVED,
            DwimError::ExecutionFailure(_) => exit_codes::USER_ERROR,
            DwimError::LedgerWriteFailure(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for dwim operations.
pub type Result<T> = std::result::Result<T, DwimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = DwimError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn interpretation_errors_share_failure_code() {
        let err = DwimError::InterpretationFailure("service declined".to_string());
        assert_eq!(err.exit_code(), exit_codes::INTERPRETATION_FAILURE);

        let err = DwimError::InterpretationTimeout { seconds: 30 };
        assert_eq!(err.exit_code(), exit_codes::INTERPRETATION_FAILURE);
    }

    #[test]
    fn token_errors_have_distinct_exit_codes() {
        let not_found = DwimError::TokenNotFound("abc".to_string());
        let expired = DwimError::TokenExpired("abc".to_string());
        let resolved = DwimError::TokenAlreadyResolved("abc".to_string());

        assert_eq!(not_found.exit_code(), exit_codes::TOKEN_NOT_FOUND);
        assert_eq!(expired.exit_code(), exit_codes::TOKEN_EXPIRED);
        assert_eq!(resolved.exit_code(), exit_codes::TOKEN_ALREADY_RESOLVED);
    }

    #[test]
    fn execution_failure_is_a_user_facing_error() {
        let err = DwimError::ExecutionFailure("failed to execute 'x'".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = DwimError::TokenExpired("deadbeef".to_string());
        assert_eq!(
            err.to_string(),
            "clarification token 'deadbeef' has expired"
        );

        let err = DwimError::InterpretationTimeout { seconds: 30 };
        assert_eq!(err.to_string(), "interpretation timed out after 30s");
    }
}
