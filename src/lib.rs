//! GraphQL Client Runtime
//!
//! A GraphQL client core built around a normalized response cache:
//!
//! - **Normalization**: flatten response trees into keyed records linked by references
//! - **Cache reads**: rebuild response data for an operation from the record graph
//! - **Fetch policies**: order and fall back between cache and network per call
//! - **Watchers**: re-emit a query's data when the records it was built from change
//!
//! The workspace crates are re-exported whole, and the most used types are
//! lifted to the top level.

pub mod loader;
pub mod logging;

pub use gql_fetcher as fetcher;
pub use gql_normalized_cache as cache;
pub use gql_runtime_types as types;
pub use gql_transport as transport;

pub use gql_fetcher::{
    ClientConfig, ClientError, FetchPolicy, GraphQLClient, QueryWatcher, Response, WatchHandle,
};
pub use gql_normalized_cache::{
    CacheError, CacheKey, CacheKeyResolver, CacheStore, EvictionPolicy, IdFieldResolver,
    NoIdentityResolver, Record, RecordStore, ScalarAdapters,
};
pub use gql_runtime_types::{FieldType, Operation, OperationKind, ResponseField, Variables};
pub use gql_transport::{HttpTransport, NetworkTransport, ReplayTransport};
