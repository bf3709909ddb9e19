//! Batches of records and the change sets merges produce.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::record::Record;

/// Records produced by one normalization, at most one per key.
///
/// Adding a record whose key is already present merges it into the existing
/// one, so an entity that appears twice in a response (for example as the
/// hero and as a friend of a friend) still yields one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: BTreeMap<String, Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `record` into the set; returns the field keys it changed.
    pub fn merge(&mut self, record: Record) -> BTreeSet<String> {
        match self.records.get_mut(record.key()) {
            Some(existing) => existing.merge_from(&record),
            None => {
                let changed = record.fields().keys().cloned().collect();
                self.records.insert(record.key().to_string(), record);
                changed
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records.into_values().collect()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.merge(record);
        }
        set
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::collections::btree_map::IntoValues<String, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

/// One field whose stored value changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldChange {
    pub record_key: String,
    pub field_key: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.record_key, self.field_key)
    }
}

/// The fields a store mutation actually changed.
///
/// Kept as `(record key, field key)` pairs rather than joined strings because
/// field keys may themselves contain dots (e.g. `price(min:1.5)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeSet<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record_key: impl Into<String>, field_key: impl Into<String>) {
        self.changes.insert(FieldChange {
            record_key: record_key.into(),
            field_key: field_key.into(),
        });
    }

    /// Record every field key in `field_keys` as changed for `record_key`.
    pub fn extend_record<I>(&mut self, record_key: &str, field_keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        for field_key in field_keys {
            self.insert(record_key, field_key);
        }
    }

    pub fn extend(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    pub fn contains(&self, record_key: &str, field_key: &str) -> bool {
        self.changes
            .iter()
            .any(|c| c.record_key == record_key && c.field_key == field_key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn record_keys(&self) -> BTreeSet<&str> {
        self.changes.iter().map(|c| c.record_key.as_str()).collect()
    }

    /// Whether any changed field belongs to a record in `dependent_keys`.
    pub fn touches(&self, dependent_keys: &BTreeSet<String>) -> bool {
        self.changes
            .iter()
            .any(|c| dependent_keys.contains(&c.record_key))
    }
}
