//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared across the workspace. All errors use
//! `thiserror` for derive-based `Display`/`Error` implementations.
//!
//! - Transition errors carry the kind, states, and recovery metadata
//!   a caller needs to decide whether to retry.
//! - Operation errors distinguish transient (retryable) causes from
//!   permanent ones, per the failure-verb wrapping rules.
//! - Store errors surface persistence-layer failures without ever
//!   mutating on the way out.

use crate::temporal::Timestamp;

/// Top-level error type for the workspace.
#[derive(thiserror::Error, Debug)]
pub enum V2eError {
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The category of a rejected or failed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionErrorKind {
    /// The validator rejected `from -> to`. Never recoverable.
    InvalidTransition,
    /// A `TransitionWithHandler` body returned an error; the transition
    /// was rolled back.
    TransitionFailed,
    /// A rollback itself could not complete.
    RollbackFailed,
    /// Retry budget exhausted (`retryCount > maxRetries`) or the last
    /// error is tagged permanent.
    RecoveryExhausted,
}

impl std::fmt::Display for TransitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::TransitionFailed => "TRANSITION_FAILED",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RecoveryExhausted => "RECOVERY_EXHAUSTED",
        };
        f.write_str(s)
    }
}

/// A transition-layer error: rejection, handler failure, rollback
/// failure, or retry exhaustion.
#[derive(thiserror::Error, Debug)]
#[error("{kind} from {from_state} to {to_state}{cause_suffix}", cause_suffix = self.cause_suffix())]
pub struct TransitionError {
    pub kind: TransitionErrorKind,
    pub from_state: String,
    pub to_state: String,
    pub cause: Option<String>,
    pub timestamp: Timestamp,
    pub recovery_attempts: u32,
    pub can_recover: bool,
    pub rolled_back: bool,
}

impl TransitionError {
    fn cause_suffix(&self) -> String {
        match &self.cause {
            Some(c) => format!(": {c}"),
            None => String::new(),
        }
    }

    /// A rejected transition, per §4.1 of the validator.
    pub fn invalid(from_state: impl Into<String>, to_state: impl Into<String>) -> Self {
        Self {
            kind: TransitionErrorKind::InvalidTransition,
            from_state: from_state.into(),
            to_state: to_state.into(),
            cause: None,
            timestamp: Timestamp::now(),
            recovery_attempts: 0,
            can_recover: false,
            rolled_back: false,
        }
    }

    /// A `TransitionWithHandler` body failed; state was rolled back.
    pub fn handler_failed(
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            kind: TransitionErrorKind::TransitionFailed,
            from_state: from_state.into(),
            to_state: to_state.into(),
            cause: Some(cause.into()),
            timestamp: Timestamp::now(),
            recovery_attempts: 0,
            can_recover: true,
            rolled_back: true,
        }
    }

    /// Retry budget exhausted or the last error is permanent.
    pub fn recovery_exhausted(
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        recovery_attempts: u32,
    ) -> Self {
        Self {
            kind: TransitionErrorKind::RecoveryExhausted,
            from_state: from_state.into(),
            to_state: to_state.into(),
            cause: None,
            timestamp: Timestamp::now(),
            recovery_attempts,
            can_recover: false,
            rolled_back: false,
        }
    }
}

/// Distinguishes retryable from non-retryable operation failures, as
/// wrapped by the Graph FSM's failure verbs.
#[derive(thiserror::Error, Debug, Clone)]
pub enum OperationError {
    #[error("transient failure in state {state}: {cause}")]
    Transient { state: String, cause: String },

    #[error("permanent failure: {cause}")]
    Permanent { cause: String },
}

impl OperationError {
    /// Wrap a bare cause as transient with the originating state attached,
    /// per §4.2: "if not already tagged, it becomes TRANSIENT."
    pub fn tag_transient(state: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Transient {
            state: state.into(),
            cause: cause.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    pub fn cause(&self) -> &str {
        match self {
            Self::Transient { cause, .. } => cause,
            Self::Permanent { cause } => cause,
        }
    }
}

/// Persistence-layer errors.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("corrupt record at {key}: {detail}")]
    Corrupt { key: String, detail: String },

    #[error("validation failure: {detail}")]
    Validation { detail: String },

    #[error("operation timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_is_non_recoverable() {
        let err = TransitionError::invalid("idle", "analyzing");
        assert_eq!(err.kind, TransitionErrorKind::InvalidTransition);
        assert!(!err.can_recover);
        assert!(!err.rolled_back);
    }

    #[test]
    fn handler_failure_marks_rolled_back_and_recoverable() {
        let err = TransitionError::handler_failed("ready", "analyzing", "boom");
        assert!(err.can_recover);
        assert!(err.rolled_back);
        assert_eq!(err.cause.as_deref(), Some("boom"));
    }

    #[test]
    fn operation_error_tag_transient_carries_state() {
        let err = OperationError::tag_transient("building", "disk full");
        assert!(!err.is_permanent());
        assert_eq!(err.cause(), "disk full");
    }
}
