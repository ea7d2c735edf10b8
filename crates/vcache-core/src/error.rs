//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// `increment` was called on a key that does not exist.
    #[error("key not found: {0}")]
    MissingKey(String),

    /// A stored value could not be read as a counter.
    #[error("invalid counter at {key}: {reason}")]
    InvalidCounter { key: String, reason: String },
}

impl StoreError {
    /// Whether this error means the store itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
