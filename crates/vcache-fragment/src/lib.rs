//! Fragment caching keyed and versioned by dependency tokens.
//!
//! This crate provides:
//! - `FragmentCache` - Look up a rendered fragment, rebuild it when stale
//! - `TokenSet` - Literal and dynamic dependency tokens
//! - `Directive` - Parsed `'literal' expression ...` argument lists
//! - `TokenContext` - Resolves directive expressions at render time
//! - `FragmentStats` - Hit/miss/build counters
//!
//! A fragment's cache key is its tokens joined by `#`. Its version is the sum
//! of the invalidation counters stored under the same tokens, so
//! incrementing the counter for `movies` makes every fragment that lists
//! `movies` among its tokens stale.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vcache_core::MemoryStore;
//! use vcache_fragment::FragmentCache;
//! use vcache_versioned::VersionedCache;
//!
//! let cache = Arc::new(VersionedCache::new(MemoryStore::new()));
//! let fragments = FragmentCache::new(Arc::clone(&cache));
//!
//! let rendered = fragments
//!     .render_or_compute(&["movies-personal-rating", "movies"], &[user_id], || async {
//!         Ok(render_rating_list(user_id).await?)
//!     })
//!     .await?;
//!
//! // Elsewhere, after a movie is saved:
//! cache.invalidate("movies").await?;
//! ```

mod claim;
mod config;
mod directive;
mod error;
mod fragment;
mod stats;
mod token;

pub use config::*;
pub use directive::*;
pub use error::*;
pub use fragment::*;
pub use stats::*;
pub use token::*;
