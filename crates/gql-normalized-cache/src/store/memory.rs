use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::debug;

use super::{EvictionPolicy, RecordStore};
use crate::metrics::CacheMetrics;
use crate::record::Record;
use crate::record_set::{ChangeSet, RecordSet};

struct Entry {
    record: Arc<Record>,
    size: usize,
    written_at: Instant,
    accessed_at: Instant,
}

impl Entry {
    fn new(record: Record, now: Instant) -> Self {
        Self {
            size: record.size_estimate_bytes(),
            record: Arc::new(record),
            written_at: now,
            accessed_at: now,
        }
    }
}

struct Inner {
    /// Most recently used first; `pop_lru` yields the eviction victim.
    entries: LruCache<String, Entry>,
    size_bytes: usize,
}

impl Inner {
    fn take(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.pop(key)?;
        self.size_bytes = self.size_bytes.saturating_sub(entry.size);
        Some(entry)
    }
}

/// In-memory record store with optional LRU and expiry bounds.
///
/// Stored records are shared `Arc`s; a merge clones a record only when a
/// reader still holds the previous version. Expired records are dropped
/// when a read or merge reaches them.
pub struct MemoryRecordStore {
    policy: EvictionPolicy,
    inner: RwLock<Inner>,
    metrics: CacheMetrics,
}

impl MemoryRecordStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                size_bytes: 0,
            }),
            metrics: CacheMetrics::default(),
        }
    }

    /// Report evictions into shared counters.
    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Approximate total weight of live records.
    pub fn size_bytes(&self) -> usize {
        self.inner.read().size_bytes
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.policy.is_expired(
            now.saturating_duration_since(entry.written_at),
            now.saturating_duration_since(entry.accessed_at),
        )
    }

    fn enforce_capacity(&self, inner: &mut Inner) {
        let mut evicted = 0u64;
        while self
            .policy
            .over_capacity(inner.entries.len(), inner.size_bytes)
        {
            let Some((_, entry)) = inner.entries.pop_lru() else {
                break;
            };
            inner.size_bytes = inner.size_bytes.saturating_sub(entry.size);
            evicted += 1;
        }
        if evicted == 0 {
            return;
        }
        self.metrics.record_evictions(evicted);
        debug!(
            evicted = evicted,
            remaining = inner.entries.len(),
            size_bytes = inner.size_bytes,
            "evicted least recently used records"
        );
    }

    fn remove_entry(inner: &mut Inner, key: &str, changes: &mut ChangeSet) -> Option<Arc<Record>> {
        let entry = inner.take(key)?;
        changes.extend_record(key, entry.record.fields().keys().cloned());
        Some(entry.record)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::NO_EVICTION)
    }
}

impl RecordStore for MemoryRecordStore {
    fn load_record(&self, key: &str) -> Option<Arc<Record>> {
        let now = Instant::now();
        // Promotion reorders the recency list, so reads take the write lock.
        let mut inner = self.inner.write();
        let expired = self.is_expired(inner.entries.peek(key)?, now);
        if expired {
            inner.take(key);
            debug!(key = key, "dropped expired record");
            return None;
        }
        let entry = inner.entries.get_mut(key)?;
        entry.accessed_at = now;
        Some(Arc::clone(&entry.record))
    }

    fn merge_all(&self, records: RecordSet) -> ChangeSet {
        let now = Instant::now();
        let mut changes = ChangeSet::new();
        let mut merged = 0u64;
        let mut inner = self.inner.write();

        for record in records {
            let key = record.key().to_string();
            let expired = inner
                .entries
                .peek(&key)
                .is_some_and(|entry| self.is_expired(entry, now));
            if expired {
                inner.take(&key);
            }

            let inner = &mut *inner;
            match inner.entries.get_mut(&key) {
                Some(entry) => {
                    let changed = Arc::make_mut(&mut entry.record).merge_from(&record);
                    if !changed.is_empty() {
                        let size = entry.record.size_estimate_bytes();
                        inner.size_bytes = inner.size_bytes.saturating_sub(entry.size) + size;
                        entry.size = size;
                        entry.written_at = now;
                        merged += 1;
                    }
                    entry.accessed_at = now;
                    changes.extend_record(&key, changed);
                }
                None => {
                    changes.extend_record(&key, record.fields().keys().cloned());
                    let entry = Entry::new(record, now);
                    inner.size_bytes += entry.size;
                    inner.entries.put(key, entry);
                    merged += 1;
                }
            }
        }

        self.enforce_capacity(&mut inner);
        self.metrics.record_merge(merged, changes.len() as u64);
        debug!(
            merged = merged,
            changed_fields = changes.len(),
            total = inner.entries.len(),
            "merged record set"
        );
        changes
    }

    fn remove(&self, key: &str, cascade: bool) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let mut inner = self.inner.write();

        let mut queue = VecDeque::from([key.to_string()]);
        let mut visited = BTreeSet::new();
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            let Some(removed) = Self::remove_entry(&mut inner, &next, &mut changes) else {
                continue;
            };
            if cascade {
                queue.extend(removed.references().into_iter().map(|r| r.key().to_string()));
            }
        }

        debug!(key = key, cascade = cascade, changed_fields = changes.len(), "removed records");
        changes
    }

    fn clear(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let mut inner = self.inner.write();
        while let Some((key, entry)) = inner.entries.pop_lru() {
            changes.extend_record(&key, entry.record.fields().keys().cloned());
        }
        inner.size_bytes = 0;
        debug!(changed_fields = changes.len(), "cleared record store");
        changes
    }

    fn dump(&self) -> Vec<Record> {
        let now = Instant::now();
        let inner = self.inner.read();
        let mut records: Vec<Record> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry, now))
            .map(|(_, entry)| entry.record.as_ref().clone())
            .collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry, now))
            .count()
    }
}
