//! Versioned fragment caching with stampede protection.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vcache_core::KvStore;
use vcache_versioned::{CacheError, VersionedCache};

use crate::claim::BuildClaims;
use crate::config::{FragmentConfig, OutagePolicy};
use crate::directive::Directive;
use crate::error::{FragmentError, FragmentResult};
use crate::stats::{FragmentStats, StatsRecorder};
use crate::token::{TokenContext, TokenSet};

/// How a render was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Cached fragment matched the current version.
    Hit,
    /// Fragment was rebuilt and stored.
    Miss,
    /// Another caller in this process rebuilt the fragment while we waited.
    Joined,
    /// Store unavailable; fragment was rendered without caching.
    Bypass,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Joined => write!(f, "JOINED"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// A rendered fragment and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The fragment content.
    pub content: String,
    /// Cache status of this render.
    pub status: CacheStatus,
}

impl Rendered {
    fn new(content: String, status: CacheStatus) -> Self {
        Self { content, status }
    }

    /// Whether the render callback was skipped.
    pub fn from_cache(&self) -> bool {
        matches!(self.status, CacheStatus::Hit | CacheStatus::Joined)
    }
}

/// Fragment cache over a shared [`VersionedCache`].
///
/// The version of a fragment is the sum of the counters named by its tokens.
/// Invalidate fragments by incrementing those counters through the same
/// `VersionedCache` handle.
pub struct FragmentCache<S> {
    cache: Arc<VersionedCache<S>>,
    config: FragmentConfig,
    claims: BuildClaims,
    stats: StatsRecorder,
}

impl<S: KvStore> FragmentCache<S> {
    /// Create a fragment cache with the default configuration.
    pub fn new(cache: Arc<VersionedCache<S>>) -> Self {
        Self {
            cache,
            config: FragmentConfig::default(),
            claims: BuildClaims::default(),
            stats: StatsRecorder::default(),
        }
    }

    /// Create a fragment cache with an explicit configuration.
    pub fn with_config(cache: Arc<VersionedCache<S>>, config: FragmentConfig) -> FragmentResult<Self> {
        config.validate()?;
        Ok(Self {
            cache,
            config,
            claims: BuildClaims::default(),
            stats: StatsRecorder::default(),
        })
    }

    /// The shared versioned cache.
    pub fn versioned(&self) -> &Arc<VersionedCache<S>> {
        &self.cache
    }

    /// The active configuration.
    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Statistics since creation.
    pub fn stats(&self) -> FragmentStats {
        self.stats.snapshot()
    }

    /// The cache key for a token set under this configuration.
    pub fn key_for(&self, tokens: &TokenSet) -> String {
        tokens.key(&self.config.separator)
    }

    /// Return the cached fragment for these tokens, or build and store it.
    ///
    /// `compute` runs at most once, and only when no fragment is cached under
    /// the current version. When it fails nothing is written.
    pub async fn render_or_compute<L, D, F, Fut>(
        &self,
        literal_tokens: &[L],
        dynamic_tokens: &[D],
        compute: F,
    ) -> FragmentResult<Rendered>
    where
        L: AsRef<str>,
        D: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let tokens = TokenSet::from_parts(literal_tokens, dynamic_tokens);
        self.render(&tokens, compute).await
    }

    /// Resolve a directive against `context` and render it.
    pub async fn render_directive<C, F, Fut>(
        &self,
        directive: &Directive,
        context: &C,
        compute: F,
    ) -> FragmentResult<Rendered>
    where
        C: TokenContext + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let tokens = directive.resolve(context)?;
        self.render(&tokens, compute).await
    }

    /// Parse a directive argument list, then render it like
    /// [`render_directive`](Self::render_directive).
    pub async fn render_directive_str<C, F, Fut>(
        &self,
        args: &str,
        context: &C,
        compute: F,
    ) -> FragmentResult<Rendered>
    where
        C: TokenContext + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let directive = Directive::parse(args)?;
        self.render_directive(&directive, context, compute).await
    }

    /// Render a fragment for an already-built token set.
    pub async fn render<F, Fut>(&self, tokens: &TokenSet, compute: F) -> FragmentResult<Rendered>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let key = self.key_for(tokens);
        let names = tokens.tokens();

        let version = match self.cache.sum(&names).await {
            Ok(version) => version,
            Err(err) => {
                self.absorb_outage(&key, err)?;
                let content = self.build(compute).await?;
                return Ok(self.finish(content, CacheStatus::Bypass));
            }
        };

        match self.lookup(&key, version).await {
            Ok(Some(content)) => {
                tracing::debug!(key = %key, version, "fragment cache hit");
                return Ok(self.finish(content, CacheStatus::Hit));
            }
            Ok(None) => {}
            Err(err) => {
                self.absorb_outage(&key, err)?;
                let content = self.build(compute).await?;
                self.store(&key, &content, version).await?;
                return Ok(self.finish(content, CacheStatus::Bypass));
            }
        }

        let mut status = CacheStatus::Miss;

        // Held until the new fragment is stored.
        let _claim = if self.config.dedupe_builds {
            let claim = self.claims.acquire(&key).await;
            // Someone may have stored it between our lookup and the claim.
            match self.lookup(&key, version).await {
                Ok(Some(content)) => {
                    tracing::debug!(key = %key, version, "joined concurrent fragment build");
                    return Ok(self.finish(content, CacheStatus::Joined));
                }
                Ok(None) => {}
                Err(err) => {
                    self.absorb_outage(&key, err)?;
                    status = CacheStatus::Bypass;
                }
            }
            Some(claim)
        } else {
            None
        };

        tracing::debug!(key = %key, version, %status, "fragment cache miss");
        let content = self.build(compute).await?;
        self.store(&key, &content, version).await?;
        Ok(self.finish(content, status))
    }

    async fn lookup(&self, key: &str, version: u64) -> Result<Option<String>, CacheError> {
        self.cache.get_versioned::<String>(key, version).await
    }

    async fn build<F, Fut>(&self, compute: F) -> FragmentResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        self.stats.record_build();
        compute().await.map_err(|err| {
            self.stats.record_build_failure();
            FragmentError::Compute(err)
        })
    }

    async fn store(&self, key: &str, content: &str, version: u64) -> FragmentResult<()> {
        match self.cache.set_versioned(key, content, version).await {
            Ok(()) => Ok(()),
            Err(err) => self.absorb_outage(key, err),
        }
    }

    // Swallow store outages under `OutagePolicy::Recompute`; everything else propagates.
    fn absorb_outage(&self, key: &str, err: CacheError) -> FragmentResult<()> {
        if self.config.outage_policy == OutagePolicy::Recompute && err.is_unavailable() {
            tracing::warn!(key, error = %err, "store unavailable, rendering without cache");
            Ok(())
        } else {
            Err(err.into())
        }
    }

    fn finish(&self, content: String, status: CacheStatus) -> Rendered {
        self.stats.record(status);
        Rendered::new(content, status)
    }
}

impl<S> std::fmt::Debug for FragmentCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentCache")
            .field("config", &self.config)
            .field("in_flight", &self.claims.in_flight())
            .finish_non_exhaustive()
    }
}
