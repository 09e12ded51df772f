//! Collaborator error types.

use thiserror::Error;

/// Result type alias for collaborator reads.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure reading cluster or queue state.
///
/// These are transient: the controller skips the tick that hit one and
/// relies on the next scheduled tick to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),
}
