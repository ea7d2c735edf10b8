//! Fragment cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::fragment::CacheStatus;

/// Live counters updated by every render.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
    bypassed: AtomicU64,
    builds: AtomicU64,
    build_failures: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record(&self, status: CacheStatus) {
        let counter = match status {
            CacheStatus::Hit => &self.hits,
            CacheStatus::Miss => &self.misses,
            CacheStatus::Joined => &self.joined,
            CacheStatus::Bypass => &self.bypassed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build_failure(&self) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FragmentStats {
        FragmentStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time fragment cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentStats {
    /// Renders served from the cache.
    pub hits: u64,
    /// Renders that rebuilt the fragment.
    pub misses: u64,
    /// Renders that waited for a concurrent build and reused its result.
    pub joined: u64,
    /// Renders that could not consult the store.
    pub bypassed: u64,
    /// Calls to a render callback.
    pub builds: u64,
    /// Render callbacks that returned an error.
    pub build_failures: u64,
}

impl FragmentStats {
    /// Fraction of renders that did not invoke a callback (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.joined;
        let total = served + self.misses + self.bypassed;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = FragmentStats {
            hits: 2,
            joined: 1,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(FragmentStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_recorder_snapshot() {
        let recorder = StatsRecorder::default();
        recorder.record(CacheStatus::Hit);
        recorder.record(CacheStatus::Miss);
        recorder.record(CacheStatus::Miss);
        recorder.record_build();
        recorder.record_build_failure();

        let stats = recorder.snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.build_failures, 1);
    }
}
