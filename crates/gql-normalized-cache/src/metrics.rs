//! Metrics and reporting for normalized cache operations.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache operation metrics (thread-safe counters, shared by clones).
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Operation or fragment reads fully satisfied by the cache
    pub hits: Arc<AtomicU64>,
    /// Reads that hit a missing record or field
    pub misses: Arc<AtomicU64>,
    /// Records merged (new or updated)
    pub records_merged: Arc<AtomicU64>,
    /// Fields whose stored value actually changed
    pub fields_changed: Arc<AtomicU64>,
    /// Records dropped by a count or size bound
    pub evictions: Arc<AtomicU64>,
    /// Requests sent to the network
    pub network_fetches: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self, records: u64, fields_changed: u64) {
        self.records_merged.fetch_add(records, Ordering::Relaxed);
        self.fields_changed
            .fetch_add(fields_changed, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            records_merged: self.records_merged.load(Ordering::Relaxed),
            fields_changed: self.fields_changed.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.records_merged.store(0, Ordering::Relaxed);
        self.fields_changed.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.network_fetches.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub records_merged: u64,
    pub fields_changed: u64,
    pub evictions: u64,
    pub network_fetches: u64,
}

impl MetricsSnapshot {
    pub fn total_reads(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Normalized Cache Metrics".to_string());
        lines.push("=".repeat(50));
        lines.push("Reads:".to_string());
        lines.push(format!("  Hits:            {}", self.hits));
        lines.push(format!("  Misses:          {}", self.misses));
        lines.push(format!("  Hit Rate:        {:.1}%", self.hit_rate() * 100.0));
        lines.push(String::new());
        lines.push("Writes:".to_string());
        lines.push(format!("  Records Merged:  {}", self.records_merged));
        lines.push(format!("  Fields Changed:  {}", self.fields_changed));
        lines.push(format!("  Evictions:       {}", self.evictions));
        lines.push(String::new());
        lines.push(format!("Network Fetches:   {}", self.network_fetches));
        lines.join("\n")
    }
}
