//! Fragment cache error types.

use thiserror::Error;
use vcache_versioned::CacheError;

use crate::directive::DirectiveError;

/// Result type for fragment operations.
pub type FragmentResult<T> = Result<T, FragmentError>;

/// Errors that can occur while rendering a cached fragment.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// The versioned cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The directive could not be parsed.
    #[error(transparent)]
    Directive(#[from] DirectiveError),

    /// A directive expression had no value in the render context.
    #[error("unresolved token expression: {0}")]
    UnresolvedToken(String),

    /// The fragment body failed to render. Nothing was cached.
    #[error("fragment computation failed: {0}")]
    Compute(#[source] anyhow::Error),
}

impl FragmentError {
    /// Whether this error means the backing store is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Cache(err) if err.is_unavailable())
    }
}
