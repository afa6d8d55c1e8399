//! Engine error taxonomy.
//!
//! Three classes, per the propagation policy:
//!
//! - `NotFound` and `Conflict` are expected, user-actionable outcomes,
//!   surfaced verbatim with enough context to retry with corrected input;
//!   never retried automatically by callers.
//! - `Internal` is logged with full context and surfaced as a generic
//!   failure; the polling client backs off on it.

use roster_store::StoreError;
use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the reconciliation core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A referenced campaign, creator, or association does not exist, or a
    /// business + month lookup was ambiguous.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate an invariant, or a concurrent writer won
    /// a compare-and-swap race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store unavailable or transaction aborted for an unexpected reason.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            EngineError::NotFound(err.to_string())
        } else if err.is_conflict() {
            EngineError::Conflict(err.to_string())
        } else {
            EngineError::Internal(err.to_string())
        }
    }
}
