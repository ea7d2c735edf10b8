//! Key/value store contract for the versioned cache.
//!
//! This crate provides:
//! - `KvStore` - The minimal async capability a backing store must offer
//! - `StoreError` - Failures reported by a backing store
//! - `MemoryStore` - Thread-safe in-process store with per-entry expiry
//! - `encode_counter` / `decode_counter` - Wire format for counter entries
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use vcache_core::{KvStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("greeting", b"hello".to_vec(), Duration::from_secs(60)).await?;
//! assert!(store.has("greeting").await?);
//! ```

mod error;
mod memory;
mod store;

pub use error::*;
pub use memory::*;
pub use store::*;
