//! Resolver counters
//!
//! Plain atomics so `resolve` stays lock-free; exporters read
//! [`ResolverMetrics::snapshot`].

use crate::resolution::Outcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub allowed: u64,
    pub denied: u64,
    pub malformed: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
    pub conflicts: u64,
}

impl MetricsSnapshot {
    pub fn total_resolutions(&self) -> u64 {
        self.allowed + self.denied + self.malformed
    }

    /// Fraction of resolutions that were allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.total_resolutions();
        if total == 0 {
            0.0
        } else {
            self.allowed as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolverMetrics {
    allowed: AtomicU64,
    denied: AtomicU64,
    malformed: AtomicU64,
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
    conflicts: AtomicU64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Allowed => &self.allowed,
            Outcome::Denied => &self.denied,
            Outcome::Malformed => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self, conflicts: usize) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        self.conflicts.fetch_add(conflicts as u64, Ordering::Relaxed);
    }

    pub fn record_failed_reload(&self) {
        self.failed_reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            failed_reloads: self.failed_reloads.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ResolverMetrics::new();
        metrics.record_outcome(Outcome::Allowed);
        metrics.record_outcome(Outcome::Allowed);
        metrics.record_outcome(Outcome::Denied);
        metrics.record_outcome(Outcome::Malformed);
        metrics.record_reload(2);
        metrics.record_failed_reload();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_resolutions(), 4);
        assert_eq!(snap.allow_rate(), 0.5);
        assert_eq!(snap.reloads, 1);
        assert_eq!(snap.conflicts, 2);
        assert_eq!(snap.failed_reloads, 1);
    }

    #[test]
    fn test_empty_allow_rate() {
        assert_eq!(MetricsSnapshot::default().allow_rate(), 0.0);
    }
}
