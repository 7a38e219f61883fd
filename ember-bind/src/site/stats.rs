//! Per-site counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated on the dispatch path. Relaxed ordering throughout; the
/// numbers are diagnostic and never drive binding decisions.
#[derive(Debug, Default)]
pub struct SiteStats {
    hits: AtomicU64,
    misses: AtomicU64,
    resolutions: AtomicU64,
    late_bound: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

/// A point-in-time copy of [`SiteStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Dispatches answered by a cached rule.
    pub hits: u64,
    /// Dispatches no cached rule admitted.
    pub misses: u64,
    /// Full discovery and resolution runs.
    pub resolutions: u64,
    /// Late-bound binds of external receivers.
    pub late_bound: u64,
    /// Binding failures reported to the caller.
    pub failures: u64,
    /// Rules evicted from a full chain.
    pub evictions: u64,
}

impl SiteStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late_bound(&self) {
        self.late_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            late_bound: self.late_bound.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Fraction of dispatches answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
