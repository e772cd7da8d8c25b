//! Process-wide counters for indexing and search.
//!
//! Constructed once by the host and shared through an `Arc`; the indexer and
//! the search engine only increment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Simple metrics collector.
#[derive(Debug)]
pub struct IndexMetrics {
    /// Documents written by successful batches.
    pub files_indexed: AtomicU64,
    /// Files skipped by the mtime check.
    pub files_skipped: AtomicU64,
    /// Files that failed to stat, parse or write.
    pub files_failed: AtomicU64,
    /// Committed write transactions.
    pub batches_committed: AtomicU64,
    /// Rolled-back write transactions.
    pub batches_failed: AtomicU64,
    /// Searches executed.
    pub searches_total: AtomicU64,
    /// Cumulative search time in microseconds.
    pub search_micros_total: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of [`IndexMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub searches_total: u64,
    pub search_micros_total: u64,
    pub uptime_secs: u64,
}

impl Default for IndexMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            files_indexed: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            batches_committed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            searches_total: AtomicU64::new(0),
            search_micros_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn inc_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self, n: u64) {
        self.files_failed.fetch_add(n, Ordering::Relaxed);
    }

    /// Record a committed batch of `docs` documents.
    pub fn record_batch(&self, docs: u64) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.files_indexed.fetch_add(docs, Ordering::Relaxed);
    }

    /// Record a rolled-back batch; its documents count as failed files.
    pub fn record_failed_batch(&self, docs: u64) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.inc_failed(docs);
    }

    /// Record one executed search.
    pub fn record_search(&self, elapsed: std::time::Duration) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.search_micros_total.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_indexed: self.files_indexed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            searches_total: self.searches_total.load(Ordering::Relaxed),
            search_micros_total: self.search_micros_total.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
