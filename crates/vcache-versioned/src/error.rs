//! Versioned cache error types.

use thiserror::Error;
use vcache_core::StoreError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur when using the versioned cache.
///
/// A version mismatch is not an error: it is reported as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A counter key holds something other than a counter.
    #[error("invalid counter at {key}: {reason}")]
    InvalidCounter { key: String, reason: String },

    /// The store rejected an operation for another reason.
    #[error("store operation failed: {0}")]
    Store(String),

    /// Failed to serialize a value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Whether this error means the store itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StoreError::InvalidCounter { key, reason } => Self::InvalidCounter { key, reason },
            other => Self::Store(other.to_string()),
        }
    }
}
