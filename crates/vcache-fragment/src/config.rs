//! Fragment cache configuration.

use serde::{Deserialize, Serialize};
use vcache_versioned::{CacheError, CacheResult};

use crate::token::{DEFAULT_SEPARATOR, KEY_ESCAPE};

/// What to do when the backing store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutagePolicy {
    /// Return the store error to the caller.
    #[default]
    Propagate,
    /// Render the fragment anyway and skip caching.
    Recompute,
}

/// Configuration for a [`FragmentCache`](crate::FragmentCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentConfig {
    /// Separator between tokens in the cache key.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Join concurrent rebuilds of the same fragment within this process.
    #[serde(default = "default_dedupe_builds")]
    pub dedupe_builds: bool,

    /// Behaviour when the store is unavailable.
    #[serde(default)]
    pub outage_policy: OutagePolicy,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_dedupe_builds() -> bool {
    true
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            dedupe_builds: default_dedupe_builds(),
            outage_policy: OutagePolicy::default(),
        }
    }
}

impl FragmentConfig {
    /// Set the key separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Enable or disable build deduplication.
    pub fn with_dedupe_builds(mut self, enabled: bool) -> Self {
        self.dedupe_builds = enabled;
        self
    }

    /// Set the outage policy.
    pub fn with_outage_policy(mut self, policy: OutagePolicy) -> Self {
        self.outage_policy = policy;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> CacheResult<()> {
        if self.separator.is_empty() {
            return Err(CacheError::Config("separator must not be empty".to_string()));
        }
        if self.separator.contains(KEY_ESCAPE) {
            return Err(CacheError::Config(format!(
                "separator must not contain the escape character {KEY_ESCAPE:?}"
            )));
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FragmentConfig::default();
        assert_eq!(config.separator, "#");
        assert!(config.dedupe_builds);
        assert_eq!(config.outage_policy, OutagePolicy::Propagate);
    }

    #[test]
    fn test_from_toml() {
        let config = FragmentConfig::from_toml_str(
            r#"
            separator = "|"
            dedupe_builds = false
            outage_policy = "recompute"
            "#,
        )
        .unwrap();

        assert_eq!(config.separator, "|");
        assert!(!config.dedupe_builds);
        assert_eq!(config.outage_policy, OutagePolicy::Recompute);
    }

    #[test]
    fn test_rejects_empty_separator() {
        let err = FragmentConfig::from_toml_str(r#"separator = """#).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_rejects_escape_in_separator() {
        let err = FragmentConfig::default().with_separator("\\\\").validate().unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
