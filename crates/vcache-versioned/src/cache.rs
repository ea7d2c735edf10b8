//! Counters and version-checked values.

use std::collections::{HashMap, HashSet};

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use vcache_core::{decode_counter, encode_counter, KvStore};

use crate::config::{CacheConfig, IncrementStrategy};
use crate::error::CacheResult;

/// Value a counter takes when it is first incremented.
pub const INITIAL_COUNTER: u64 = 1;

/// Store namespace for counter entries.
pub const COUNTER_NAMESPACE: &str = "c";

/// Store namespace for versioned value entries.
pub const VALUE_NAMESPACE: &str = "v";

#[derive(Serialize)]
struct EntryRef<'a, T: ?Sized> {
    value: &'a T,
    version: u64,
}

#[derive(Deserialize)]
struct Entry<T> {
    value: T,
    version: u64,
}

/// Versioned cache handle.
///
/// Construct one per process and share it by reference or `Arc`. The handle
/// holds no state besides the store and its configuration.
#[derive(Debug)]
pub struct VersionedCache<S> {
    store: S,
    config: CacheConfig,
}

impl<S: KvStore> VersionedCache<S> {
    /// Create a cache with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: CacheConfig::default(),
        }
    }

    /// Create a cache with an explicit configuration.
    pub fn with_config(store: S, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn store_key(&self, namespace: &str, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}:{}", prefix, namespace, key),
            None => format!("{}:{}", namespace, key),
        }
    }

    /// Physical store key holding the counter `key`.
    ///
    /// Counters and versioned values live in separate namespaces, so a
    /// fragment keyed `movies` never collides with the `movies` counter.
    pub fn counter_key(&self, key: &str) -> String {
        self.store_key(COUNTER_NAMESPACE, key)
    }

    /// Physical store key holding the versioned value `key`.
    pub fn value_key(&self, key: &str) -> String {
        self.store_key(VALUE_NAMESPACE, key)
    }

    /// Increment a counter, creating it at [`INITIAL_COUNTER`] if absent.
    ///
    /// Returns the new value. Retention is refreshed.
    pub async fn increment(&self, key: &str) -> CacheResult<u64> {
        let value = self
            .store
            .increment_or_init(&self.counter_key(key), INITIAL_COUNTER, self.config.retention())
            .await?;
        tracing::debug!(key, value, "counter incremented");
        Ok(value)
    }

    /// Increment several counters.
    ///
    /// Each distinct key is incremented once regardless of how often it
    /// appears. Returns the new value per key.
    pub async fn increment_many<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<HashMap<String, u64>> {
        let keys = distinct(keys);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        match self.config.increment_strategy {
            IncrementStrategy::Batched => self.increment_batched(&keys).await,
            IncrementStrategy::Atomic => self.increment_atomic(&keys).await,
        }
    }

    async fn increment_batched(&self, keys: &[&str]) -> CacheResult<HashMap<String, u64>> {
        let store_keys: Vec<String> = keys.iter().map(|k| self.counter_key(k)).collect();
        let current = self.store.get_many(&store_keys).await?;

        let mut updated = HashMap::with_capacity(keys.len());
        let mut writes = HashMap::with_capacity(keys.len());
        for (key, store_key) in keys.iter().zip(store_keys) {
            let next = match current.get(&store_key) {
                Some(bytes) => decode_counter(&store_key, bytes)?.saturating_add(1),
                None => INITIAL_COUNTER,
            };
            updated.insert((*key).to_string(), next);
            writes.insert(store_key, encode_counter(next));
        }

        self.store.set_many(writes, self.config.retention()).await?;
        tracing::debug!(count = updated.len(), "counters incremented (batched)");
        Ok(updated)
    }

    async fn increment_atomic(&self, keys: &[&str]) -> CacheResult<HashMap<String, u64>> {
        let ttl = self.config.retention();
        let calls = keys.iter().map(|key| async move {
            let value = self
                .store
                .increment_or_init(&self.counter_key(key), INITIAL_COUNTER, ttl)
                .await?;
            Ok::<_, vcache_core::StoreError>(((*key).to_string(), value))
        });

        let updated: HashMap<String, u64> = try_join_all(calls).await?.into_iter().collect();
        tracing::debug!(count = updated.len(), "counters incremented (atomic)");
        Ok(updated)
    }

    /// Sum the counters for `keys` in one round trip. Missing counters are 0.
    ///
    /// A key listed more than once is counted once.
    pub async fn sum<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<u64> {
        let keys = distinct(keys);
        if keys.is_empty() {
            return Ok(0);
        }

        let store_keys: Vec<String> = keys.iter().map(|k| self.counter_key(k)).collect();
        let values = self.store.get_many(&store_keys).await?;

        let mut total = 0u64;
        for (key, bytes) in &values {
            total = total.saturating_add(decode_counter(key, bytes)?);
        }
        Ok(total)
    }

    /// Current value of one counter, 0 if absent.
    pub async fn counter(&self, key: &str) -> CacheResult<u64> {
        let store_key = self.counter_key(key);
        match self.store.get(&store_key).await? {
            Some(bytes) => Ok(decode_counter(&store_key, &bytes)?),
            None => Ok(0),
        }
    }

    /// Record that the data behind `tag` changed.
    pub async fn invalidate(&self, tag: &str) -> CacheResult<u64> {
        self.increment(tag).await
    }

    /// Record that the data behind several tags changed.
    pub async fn invalidate_many<K: AsRef<str>>(&self, tags: &[K]) -> CacheResult<HashMap<String, u64>> {
        self.increment_many(tags).await
    }

    /// Store `value` tagged with `version`, replacing any existing entry.
    pub async fn set_versioned<T>(&self, key: &str, value: &T, version: u64) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(&EntryRef { value, version })?;
        self.store
            .set(&self.value_key(key), bytes, self.config.retention())
            .await?;
        Ok(())
    }

    /// Get the value at `key` if it was stored under `version`.
    ///
    /// An entry stored under another version is deleted and reported as a
    /// miss. So is an entry that does not decode as a versioned `T`.
    pub async fn get_versioned<T>(&self, key: &str, version: u64) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let store_key = self.value_key(key);
        let Some(bytes) = self.store.get(&store_key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<Entry<T>>(&bytes) {
            Ok(entry) if entry.version == version => Ok(Some(entry.value)),
            Ok(entry) => {
                tracing::debug!(
                    key,
                    stored = entry.version,
                    expected = version,
                    "evicting stale entry"
                );
                self.store.delete(&store_key).await?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "evicting undecodable entry");
                self.store.delete(&store_key).await?;
                Ok(None)
            }
        }
    }
}

fn distinct<K: AsRef<str>>(keys: &[K]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .map(|k| k.as_ref())
        .filter(|k| seen.insert(*k))
        .collect()
}
