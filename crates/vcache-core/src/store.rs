//! Backing store trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// Minimal key/value capability required by the versioned cache.
///
/// Values are opaque byte strings. Counters are stored as ASCII decimal
/// (see [`encode_counter`]), which is what memcached and redis use for their
/// native counters, so a remote store can implement `increment` natively.
///
/// Implementations must be thread-safe. Per-key operations are expected to be
/// atomic; nothing stronger is assumed.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Check whether a live entry exists.
    async fn has(&self, key: &str) -> StoreResult<bool>;

    /// Get a single value.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Get several values in one round trip. Absent keys are omitted.
    async fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>>;

    /// Store a value, replacing any existing entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Store several values in one round trip.
    async fn set_many(&self, entries: HashMap<String, Vec<u8>>, ttl: Duration) -> StoreResult<()>;

    /// Add one to an existing counter and return the new value.
    ///
    /// Fails with [`StoreError::MissingKey`] if the key is absent.
    async fn increment(&self, key: &str) -> StoreResult<u64>;

    /// Remove an entry. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Increment a counter, creating it with `initial` if absent.
    ///
    /// Either way the counter's retention is reset to `ttl`.
    ///
    /// The default implementation is a `has` check followed by `set`, or by
    /// `increment` and a `set` of the new value to refresh the deadline. It
    /// can race with another writer on the same key. Stores with a native
    /// increment-with-default should override it.
    async fn increment_or_init(&self, key: &str, initial: u64, ttl: Duration) -> StoreResult<u64> {
        if self.has(key).await? {
            let next = self.increment(key).await?;
            self.set(key, encode_counter(next), ttl).await?;
            Ok(next)
        } else {
            self.set(key, encode_counter(initial), ttl).await?;
            Ok(initial)
        }
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    async fn has(&self, key: &str) -> StoreResult<bool> {
        (**self).has(key).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        (**self).get_many(keys).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn set_many(&self, entries: HashMap<String, Vec<u8>>, ttl: Duration) -> StoreResult<()> {
        (**self).set_many(entries, ttl).await
    }

    async fn increment(&self, key: &str) -> StoreResult<u64> {
        (**self).increment(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }

    async fn increment_or_init(&self, key: &str, initial: u64, ttl: Duration) -> StoreResult<u64> {
        (**self).increment_or_init(key, initial, ttl).await
    }
}

/// Encode a counter value for storage.
pub fn encode_counter(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Decode a stored counter value.
pub fn decode_counter(key: &str, bytes: &[u8]) -> StoreResult<u64> {
    let text = std::str::from_utf8(bytes).map_err(|e| StoreError::InvalidCounter {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    text.trim().parse::<u64>().map_err(|e| StoreError::InvalidCounter {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_encoding_is_decimal() {
        assert_eq!(encode_counter(0), b"0".to_vec());
        assert_eq!(encode_counter(42), b"42".to_vec());
    }

    #[test]
    fn test_decode_counter() {
        assert_eq!(decode_counter("k", b"17").unwrap(), 17);
        assert_eq!(decode_counter("k", b" 3\n").unwrap(), 3);
    }

    #[test]
    fn test_decode_counter_rejects_garbage() {
        let err = decode_counter("movies", b"{\"value\":1}").unwrap_err();
        match err {
            StoreError::InvalidCounter { key, .. } => assert_eq!(key, "movies"),
            other => panic!("unexpected error: {other}"),
        }

        assert!(decode_counter("k", b"-1").is_err());
        assert!(decode_counter("k", &[0xff, 0xfe]).is_err());
    }
}
