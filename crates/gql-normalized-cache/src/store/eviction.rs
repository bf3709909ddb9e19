use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for a record store. Unset bounds are unlimited.
///
/// Count and size bounds evict whole records in least-recently-used order.
/// Age bounds make records invisible once expired; an expired record is
/// dropped when a read or merge reaches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    #[serde(default)]
    pub max_records: Option<usize>,
    #[serde(default)]
    pub max_size_bytes: Option<usize>,
    #[serde(default)]
    pub expire_after_write: Option<Duration>,
    #[serde(default)]
    pub expire_after_access: Option<Duration>,
}

impl EvictionPolicy {
    pub const NO_EVICTION: EvictionPolicy = EvictionPolicy {
        max_records: None,
        max_size_bytes: None,
        expire_after_write: None,
        expire_after_access: None,
    };

    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn max_size_bytes(mut self, max: usize) -> Self {
        self.max_size_bytes = Some(max);
        self
    }

    pub fn expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = Some(ttl);
        self
    }

    pub fn expire_after_access(mut self, ttl: Duration) -> Self {
        self.expire_after_access = Some(ttl);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::NO_EVICTION
    }

    pub(crate) fn over_capacity(&self, records: usize, size_bytes: usize) -> bool {
        self.max_records.is_some_and(|max| records > max)
            || self.max_size_bytes.is_some_and(|max| size_bytes > max)
    }

    pub(crate) fn is_expired(&self, since_write: Duration, since_access: Duration) -> bool {
        self.expire_after_write.is_some_and(|ttl| since_write > ttl)
            || self.expire_after_access.is_some_and(|ttl| since_access > ttl)
    }
}
