//! Error types for remote store operations.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a [`RemoteStore`](crate::RemoteStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// A round trip did not finish within its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store rejected or aborted a transaction.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// A `require_absent` guard found the entry present.
    #[error("precondition failed: {map}[{entry}] already present")]
    PreconditionFailed { map: String, entry: String },

    /// A register held a different value type than the caller expected.
    #[error("type mismatch at {map}[{entry}]: expected {expected}, found {found}")]
    TypeMismatch {
        map: String,
        entry: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
