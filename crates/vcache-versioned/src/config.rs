//! Versioned cache configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Default retention applied to every write: five days.
pub const DEFAULT_RETENTION_SECS: u64 = 60 * 60 * 24 * 5;

/// How `increment_many` talks to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementStrategy {
    /// One batched read and one batched write. A concurrent increment on the
    /// same key between the two can be lost.
    #[default]
    Batched,
    /// One atomic increment-or-init per key.
    Atomic,
}

/// Configuration for a [`VersionedCache`](crate::VersionedCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Retention for every entry written, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Strategy for batched increments.
    #[serde(default)]
    pub increment_strategy: IncrementStrategy,

    /// Namespace prepended to every physical store key as `prefix:`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            increment_strategy: IncrementStrategy::default(),
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    /// Set the retention.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    /// Set the increment strategy.
    pub fn with_increment_strategy(mut self, strategy: IncrementStrategy) -> Self {
        self.increment_strategy = strategy;
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Retention as a `Duration`.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> CacheResult<()> {
        if self.retention_secs == 0 {
            return Err(CacheError::Config("retention_secs must be positive".to_string()));
        }
        if let Some(prefix) = &self.key_prefix {
            if prefix.is_empty() {
                return Err(CacheError::Config("key_prefix must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> CacheResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(content: &str) -> CacheResult<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file. `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.retention_secs, 432_000);
        assert_eq!(config.increment_strategy, IncrementStrategy::Batched);
        assert!(config.key_prefix.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = CacheConfig::from_toml_str(
            r#"
            retention_secs = 3600
            increment_strategy = "atomic"
            key_prefix = "site"
            "#,
        )
        .unwrap();

        assert_eq!(config.retention(), Duration::from_secs(3600));
        assert_eq!(config.increment_strategy, IncrementStrategy::Atomic);
        assert_eq!(config.key_prefix.as_deref(), Some("site"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = CacheConfig::from_toml_str("").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_from_json() {
        let config = CacheConfig::from_json_str(r#"{"retention_secs": 10}"#).unwrap();
        assert_eq!(config.retention_secs, 10);
        assert_eq!(config.increment_strategy, IncrementStrategy::Batched);
    }

    #[test]
    fn test_rejects_zero_retention() {
        let err = CacheConfig::from_toml_str("retention_secs = 0").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let config = CacheConfig::default().with_key_prefix("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let err = CacheConfig::from_toml_str(r#"increment_strategy = "eventually""#).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CacheConfig::load("/nonexistent/vcache.toml").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
