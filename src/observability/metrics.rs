//! Pipeline counters
//!
//! Counters only, monotonic, reset on process start. Shared by every unit
//! of work running through one `Pipeline`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::model::ConflictPolicy;

/// Counter registry for the commit pipeline
///
/// Relaxed ordering throughout; counters are informational.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    commits: AtomicU64,
    rollbacks: AtomicU64,
    conflicts_detected: AtomicU64,
    conflicts_ignored: AtomicU64,
    conflicts_thrown: AtomicU64,
    conflicts_overwritten: AtomicU64,
    conflicts_reconstructed: AtomicU64,
    attributes_merged: AtomicU64,
    records_written: AtomicU64,
    records_removed: AtomicU64,
    queries: AtomicU64,
    notices_delivered: AtomicU64,
    notices_failed: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts_detected(&self) {
        self.conflicts_detected.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a conflict by the policy that settled it
    pub fn record_resolution(&self, policy: ConflictPolicy) {
        let counter = match policy {
            ConflictPolicy::Ignore => &self.conflicts_ignored,
            ConflictPolicy::ThrowOnConflict => &self.conflicts_thrown,
            ConflictPolicy::Overwrite => &self.conflicts_overwritten,
            ConflictPolicy::Reconstruct => &self.conflicts_reconstructed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_attributes_merged(&self, count: u64) {
        self.attributes_merged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_written(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_removed(&self, count: u64) {
        self.records_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_queries(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notices_delivered(&self) {
        self.notices_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notices_failed(&self) {
        self.notices_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            conflicts_detected: self.conflicts_detected.load(Ordering::Relaxed),
            conflicts_ignored: self.conflicts_ignored.load(Ordering::Relaxed),
            conflicts_thrown: self.conflicts_thrown.load(Ordering::Relaxed),
            conflicts_overwritten: self.conflicts_overwritten.load(Ordering::Relaxed),
            conflicts_reconstructed: self.conflicts_reconstructed.load(Ordering::Relaxed),
            attributes_merged: self.attributes_merged.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_removed: self.records_removed.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            notices_delivered: self.notices_delivered.load(Ordering::Relaxed),
            notices_failed: self.notices_failed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of the counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub commits: u64,
    pub rollbacks: u64,
    pub conflicts_detected: u64,
    pub conflicts_ignored: u64,
    pub conflicts_thrown: u64,
    pub conflicts_overwritten: u64,
    pub conflicts_reconstructed: u64,
    pub attributes_merged: u64,
    pub records_written: u64,
    pub records_removed: u64,
    pub queries: u64,
    pub notices_delivered: u64,
    pub notices_failed: u64,
}
