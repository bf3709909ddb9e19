//! Normalized GraphQL response cache.
//!
//! Response trees are flattened into [`Record`]s: one per entity the
//! [`CacheKeyResolver`] gives an identity to, one per path for everything
//! else, linked by [`CacheReference`]s. Reads re-drive the same field-by-field
//! traversal over the record graph to rebuild a response.
//!
//! # Layers
//!
//! - [`record`], [`record_set`] - records, batches, and change sets
//! - [`field_key`] - `name(arg:value,...)` keys with variables substituted
//! - [`cache_key`] - entity identity policy
//! - [`delegate`], [`reader`], [`writer`] - the shared traversal contract and
//!   its JSON, cache, and locally-built sources
//! - [`normalizer`] - the delegate that produces records
//! - [`store`] - the record store contract and the in-memory LRU store
//! - [`cache_store`] - transactions, operation/fragment reads and writes,
//!   change notification, snapshots
//!
//! # Example
//!
//! ```ignore
//! use gql_normalized_cache::{CacheStore, IdFieldResolver};
//!
//! let store = CacheStore::builder().resolver(IdFieldResolver::new()).build();
//! store.write_operation(&operation, &data)?;
//! if let Some(cached) = store.read_operation(&operation)? {
//!     println!("{}", serde_json::Value::Object(cached.data));
//! }
//! ```

pub mod cache_key;
pub mod cache_store;
pub mod delegate;
pub mod error;
pub mod field_key;
pub mod metrics;
pub mod normalizer;
pub mod reader;
pub mod record;
pub mod record_set;
pub mod scalar;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use cache_key::{CacheKey, CacheKeyResolver, IdFieldResolver, NoIdentityResolver};
pub use cache_store::{
    CacheData, CacheStore, CacheStoreBuilder, NormalizedPayload, ReadTransaction,
    SubscriptionId, WriteTransaction,
};
pub use delegate::{NoOpDelegate, ResolveDelegate};
pub use error::{CacheError, Result};
pub use field_key::field_key;
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use normalizer::{NormalizedResponse, ResponseNormalizer};
pub use reader::{CacheSource, JsonSource, ResponseReader, SourceValue, ValueSource};
pub use record::{CacheReference, Record, RecordBuilder, RecordValue};
pub use record_set::{ChangeSet, FieldChange, RecordSet};
pub use scalar::{CustomScalarAdapter, FnAdapter, PassthroughAdapter, ScalarAdapters};
pub use snapshot::CacheSnapshot;
pub use store::{EvictionPolicy, MemoryRecordStore, RecordStore};
pub use writer::{JsonEmitter, JsonMarshaller, ListItemWriter, ResponseWriter, WrittenValue};
