//! Versioned caching over an eventually-consistent key/value store.
//!
//! This crate provides:
//! - `VersionedCache` - Counters, summed versions and version-checked values
//! - `CacheConfig` - Retention, key namespacing and increment strategy
//! - `CacheError` - Errors surfaced to callers
//!
//! A value is stored together with the version it was computed under. Reading
//! it back with a different expected version evicts it. Versions are usually
//! the sum of several invalidation counters, so bumping any one counter makes
//! every value that depends on it stale.
//!
//! # Example
//!
//! ```ignore
//! use vcache_core::MemoryStore;
//! use vcache_versioned::VersionedCache;
//!
//! let cache = VersionedCache::new(MemoryStore::new());
//! let tags = vec!["movies".to_string()];
//!
//! let version = cache.sum(&tags).await?;
//! cache.set_versioned("movies", &"LIST".to_string(), version).await?;
//!
//! cache.increment("movies").await?;
//! let version = cache.sum(&tags).await?;
//! let stale: Option<String> = cache.get_versioned("movies", version).await?;
//! assert!(stale.is_none());
//! ```

mod cache;
mod config;
mod error;

pub use cache::*;
pub use config::*;
pub use error::*;
