//! Client-facing cache facade.
//!
//! [`CacheStore`] owns a [`RecordStore`], the identity policy, and the
//! custom scalar adapters, and adds what a client needs on top of raw
//! record storage:
//!
//! - whole-operation reads and writes under a store-level read/write lock, so
//!   a read never interleaves with the merge of another response
//! - change notification: every mutation's [`ChangeSet`] is published to
//!   subscribers after the lock is released
//! - snapshots to and from disk
//!
//! ```ignore
//! let store = CacheStore::builder()
//!     .resolver(IdFieldResolver::new())
//!     .eviction(EvictionPolicy::default().max_records(10_000))
//!     .build();
//! store.write_operation(&op, &data)?;
//! let cached = store.read_operation(&op)?;
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gql_runtime_types::{Operation, ResponseField, Variables};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::{Map, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache_key::{CacheKeyResolver, NoIdentityResolver};
use crate::delegate::NoOpDelegate;
use crate::error::{CacheError, Result};
use crate::metrics::CacheMetrics;
use crate::normalizer::{NormalizedResponse, ResponseNormalizer};
use crate::reader::{CacheSource, JsonSource, ResponseReader};
use crate::record::Record;
use crate::record_set::{ChangeSet, RecordSet};
use crate::scalar::ScalarAdapters;
use crate::snapshot::CacheSnapshot;
use crate::store::{EvictionPolicy, MemoryRecordStore, RecordStore};
use crate::writer::{JsonMarshaller, ResponseWriter};

/// Data reconstructed from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheData {
    pub data: Map<String, Value>,
    /// Every record the read touched.
    pub dependent_keys: BTreeSet<String>,
}

/// Network data after normalization, not yet merged.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayload {
    /// Response data with custom scalars decoded.
    pub data: Map<String, Value>,
    pub normalized: NormalizedResponse,
}

/// Identifies one change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct CacheStore {
    records: Arc<dyn RecordStore>,
    resolver: Arc<dyn CacheKeyResolver>,
    adapters: ScalarAdapters,
    transaction_lock: RwLock<()>,
    subscribers: Mutex<Vec<(SubscriptionId, UnboundedSender<ChangeSet>)>>,
    metrics: CacheMetrics,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("records", &self.records.len())
            .field("adapters", &self.adapters)
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CacheStore {
    pub fn builder() -> CacheStoreBuilder {
        CacheStoreBuilder::default()
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    pub fn resolver(&self) -> &dyn CacheKeyResolver {
        self.resolver.as_ref()
    }

    pub fn adapters(&self) -> &ScalarAdapters {
        &self.adapters
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Run `f` with a consistent view of the graph; no write transaction can
    /// interleave.
    pub fn read_transaction<T>(&self, f: impl FnOnce(&ReadTransaction<'_>) -> T) -> T {
        let tx = ReadTransaction {
            store: self,
            _guard: self.transaction_lock.read(),
        };
        f(&tx)
    }

    /// Run `f` exclusively. Changes it makes are published once the lock is
    /// released, whether or not `f` succeeds.
    pub fn write_transaction<T>(
        &self,
        f: impl FnOnce(&mut WriteTransaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut tx = WriteTransaction {
            store: self,
            _guard: self.transaction_lock.write(),
            changes: ChangeSet::new(),
        };
        let result = f(&mut tx);
        let changes = std::mem::take(&mut tx.changes);
        drop(tx);
        self.publish(&changes);
        result
    }

    /// Read an operation back out of the cache. A miss is `Ok(None)`.
    pub fn read_operation(&self, operation: &Operation) -> Result<Option<CacheData>> {
        self.read_transaction(|tx| tx.read_operation(operation))
    }

    /// Read an object subtree rooted at the record `key`.
    pub fn read_fragment(
        &self,
        selections: &[ResponseField],
        key: &str,
        variables: &Variables,
    ) -> Result<Option<CacheData>> {
        self.read_transaction(|tx| tx.read_fragment(selections, key, variables))
    }

    /// Write response-shaped `data` for `operation` into the cache.
    pub fn write_operation(
        &self,
        operation: &Operation,
        data: &Map<String, Value>,
    ) -> Result<ChangeSet> {
        self.write_transaction(|tx| tx.write_operation(operation, data))
    }

    /// Write response-shaped `data` for `selections` into the record `key`.
    pub fn write_fragment(
        &self,
        selections: &[ResponseField],
        key: &str,
        variables: &Variables,
        data: &Map<String, Value>,
    ) -> Result<ChangeSet> {
        self.write_transaction(|tx| tx.write_fragment(selections, key, variables, data))
    }

    /// Validate and normalize a network payload for `operation` without
    /// touching the store. A malformed payload fails here, before any merge.
    pub fn normalize_payload(
        &self,
        operation: &Operation,
        data: &Map<String, Value>,
    ) -> Result<NormalizedPayload> {
        let mut normalizer = ResponseNormalizer::new(self.resolver.as_ref());
        let decoded = ResponseReader::new(JsonSource, &operation.variables, &self.adapters).read(
            operation.root_key(),
            data,
            &operation.selections,
            &mut normalizer,
        )?;
        Ok(NormalizedPayload {
            data: decoded,
            normalized: normalizer.finish()?,
        })
    }

    /// Merge records as one batch and notify subscribers.
    pub fn merge_records(&self, records: RecordSet) -> ChangeSet {
        let changes = {
            let _guard = self.transaction_lock.write();
            self.records.merge_all(records)
        };
        self.publish(&changes);
        changes
    }

    pub fn remove(&self, key: &str, cascade: bool) -> ChangeSet {
        let changes = {
            let _guard = self.transaction_lock.write();
            self.records.remove(key, cascade)
        };
        self.publish(&changes);
        changes
    }

    pub fn clear_all(&self) -> ChangeSet {
        let changes = {
            let _guard = self.transaction_lock.write();
            self.records.clear()
        };
        info!(changed_fields = changes.len(), "cleared normalized cache");
        self.publish(&changes);
        changes
    }

    pub fn load_record(&self, key: &str) -> Option<Arc<Record>> {
        self.records.load_record(key)
    }

    /// Receive every non-empty change set from now on.
    pub fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<ChangeSet>) {
        let (tx, rx) = unbounded_channel();
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.lock().push((id, tx));
        debug!(subscription = %id, "cache subscription added");
        (id, rx)
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Fan `changes` out to subscribers, dropping closed ones. Must not be
    /// called while holding the transaction lock.
    pub fn publish(&self, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| tx.send(changes.clone()).is_ok());
        debug!(
            changed_fields = changes.len(),
            subscribers = subscribers.len(),
            "published cache changes"
        );
    }

    /// Save every live record to `path`.
    pub fn save_snapshot(&self, path: &Path) -> Result<usize> {
        let records = self.read_transaction(|_| self.records.dump());
        let count = records.len();
        CacheSnapshot::new(records).save(path)?;
        info!(path = %path.display(), records = count, "saved cache snapshot");
        Ok(count)
    }

    /// Merge a saved snapshot into the store.
    pub fn load_snapshot(&self, path: &Path) -> Result<ChangeSet> {
        let snapshot = CacheSnapshot::load(path)?;
        info!(
            path = %path.display(),
            records = snapshot.records.len(),
            saved_at = %snapshot.saved_at,
            "loading cache snapshot"
        );
        Ok(self.merge_records(snapshot.into_record_set()))
    }
}

/// Consistent read view; see [`CacheStore::read_transaction`].
pub struct ReadTransaction<'a> {
    store: &'a CacheStore,
    _guard: RwLockReadGuard<'a, ()>,
}

impl ReadTransaction<'_> {
    pub fn load_record(&self, key: &str) -> Option<Arc<Record>> {
        self.store.records.load_record(key)
    }

    pub fn read_operation(&self, operation: &Operation) -> Result<Option<CacheData>> {
        self.read_fragment(
            &operation.selections,
            operation.root_key(),
            &operation.variables,
        )
    }

    pub fn read_fragment(
        &self,
        selections: &[ResponseField],
        key: &str,
        variables: &Variables,
    ) -> Result<Option<CacheData>> {
        let store = self.store;
        match read_records(store, selections, key, variables) {
            Ok(data) => {
                store.metrics.record_hit();
                Ok(Some(data))
            }
            Err(err) if err.is_cache_miss() => {
                debug!(root = key, reason = %err, "cache miss");
                store.metrics.record_miss();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn read_records(
    store: &CacheStore,
    selections: &[ResponseField],
    key: &str,
    variables: &Variables,
) -> Result<CacheData> {
    let mut source = CacheSource::new(store.records.as_ref(), store.resolver.as_ref());
    let root = source.root(key)?;
    let mut reader = ResponseReader::new(source, variables, &store.adapters);
    let data = reader.read(key, &root, selections, &mut NoOpDelegate)?;
    Ok(CacheData {
        data,
        dependent_keys: reader.into_source().into_dependent_keys(),
    })
}

/// Exclusive write view; see [`CacheStore::write_transaction`].
pub struct WriteTransaction<'a> {
    store: &'a CacheStore,
    _guard: RwLockWriteGuard<'a, ()>,
    changes: ChangeSet,
}

impl WriteTransaction<'_> {
    pub fn load_record(&self, key: &str) -> Option<Arc<Record>> {
        self.store.records.load_record(key)
    }

    /// Changes made so far in this transaction.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn merge(&mut self, records: RecordSet) -> ChangeSet {
        let changes = self.store.records.merge_all(records);
        self.changes.extend(changes.clone());
        changes
    }

    pub fn remove(&mut self, key: &str, cascade: bool) -> ChangeSet {
        let changes = self.store.records.remove(key, cascade);
        self.changes.extend(changes.clone());
        changes
    }

    pub fn write_operation(
        &mut self,
        operation: &Operation,
        data: &Map<String, Value>,
    ) -> Result<ChangeSet> {
        self.write_fragment(
            &operation.selections,
            operation.root_key(),
            &operation.variables,
            data,
        )
    }

    pub fn write_fragment(
        &mut self,
        selections: &[ResponseField],
        key: &str,
        variables: &Variables,
        data: &Map<String, Value>,
    ) -> Result<ChangeSet> {
        if key.is_empty() {
            return Err(CacheError::InvalidData("empty record key".to_string()));
        }
        let adapters = &self.store.adapters;
        let mut writer = ResponseWriter::new(adapters);
        JsonMarshaller::new(variables).marshal(&mut writer, selections, data)?;

        let mut normalizer = ResponseNormalizer::new(self.store.resolver.as_ref());
        writer.resolve(key, variables, &mut normalizer)?;
        let normalized = normalizer.finish()?;
        debug!(
            root = key,
            records = normalized.records.len(),
            "writing to cache"
        );
        Ok(self.merge(normalized.records))
    }
}

/// Builder for [`CacheStore`].
#[derive(Default)]
pub struct CacheStoreBuilder {
    records: Option<Arc<dyn RecordStore>>,
    resolver: Option<Arc<dyn CacheKeyResolver>>,
    adapters: ScalarAdapters,
    eviction: EvictionPolicy,
    metrics: CacheMetrics,
}

impl CacheStoreBuilder {
    /// Use a custom record store instead of the in-memory one; the eviction
    /// policy is then the store's own business.
    pub fn record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn resolver(mut self, resolver: impl CacheKeyResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn shared_resolver(mut self, resolver: Arc<dyn CacheKeyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn adapters(mut self, adapters: ScalarAdapters) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> CacheStore {
        let metrics = self.metrics;
        let records = self.records.unwrap_or_else(|| {
            Arc::new(MemoryRecordStore::new(self.eviction).with_metrics(metrics.clone()))
        });
        CacheStore {
            records,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(NoIdentityResolver)),
            adapters: self.adapters,
            transaction_lock: RwLock::new(()),
            subscribers: Mutex::new(Vec::new()),
            metrics,
        }
    }
}
