//! Record storage.
//!
//! [`RecordStore`] is the contract every backing store satisfies: keyed
//! loads, batched right-biased merges that report what changed, and removal.
//! Mutations on one store instance are mutually exclusive; loads may run
//! concurrently with each other and observe a record either before or after
//! a merge, never half-merged.

mod eviction;
mod memory;

pub use eviction::EvictionPolicy;
pub use memory::MemoryRecordStore;

use std::sync::Arc;

use crate::record::Record;
use crate::record_set::{ChangeSet, RecordSet};

pub trait RecordStore: Send + Sync {
    /// Current merged state of `key`, or `None` if never written, removed,
    /// evicted, or expired.
    fn load_record(&self, key: &str) -> Option<Arc<Record>>;

    /// Batch form of [`RecordStore::load_record`]; missing keys are skipped.
    fn load_records(&self, keys: &[&str]) -> Vec<Arc<Record>> {
        keys.iter().filter_map(|key| self.load_record(key)).collect()
    }

    /// Merge one record; returns the fields whose value changed.
    fn merge(&self, record: Record) -> ChangeSet {
        self.merge_all(std::iter::once(record).collect())
    }

    /// Merge a whole batch inside one critical section.
    fn merge_all(&self, records: RecordSet) -> ChangeSet;

    /// Remove `key`, and with `cascade` every record reachable from it
    /// through references. Returns every removed field.
    fn remove(&self, key: &str, cascade: bool) -> ChangeSet;

    /// Remove everything. Returns every removed field.
    fn clear(&self) -> ChangeSet;

    /// All live records, ordered by key.
    fn dump(&self) -> Vec<Record>;

    /// Number of live records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
