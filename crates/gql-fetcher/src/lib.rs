//! Fetch-policy execution over the normalized cache.
//!
//! [`GraphQLClient`] pairs a [`CacheStore`](gql_normalized_cache::CacheStore)
//! with a [`NetworkTransport`](gql_transport::NetworkTransport) and runs each
//! query under a [`FetchPolicy`]:
//!
//! | Policy | Emissions |
//! |---|---|
//! | `CacheOnly` | cached data, or a response without data on a miss |
//! | `NetworkOnly` | fetched data |
//! | `CacheFirst` | cached data on a hit, fetched data on a miss |
//! | `NetworkFirst` | fetched data, cached data if the fetch fails |
//! | `CacheAndNetwork` | cached data (if any), then fetched data |
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use gql_fetcher::{FetchPolicy, GraphQLClient};
//!
//! let client = GraphQLClient::builder().build();
//! let responses = client
//!     .query(operation.clone())
//!     .fetch_policy(FetchPolicy::CacheAndNetwork)
//!     .execute()
//!     .await?;
//!
//! let mut watcher = client.query(operation).watch();
//! while let Some(update) = watcher.next().await {
//!     println!("{:?}", update?.data);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
mod executor;
pub mod policy;
pub mod response;
pub mod watcher;

pub use client::{GraphQLClient, GraphQLClientBuilder, QueryCall, ResponseStream};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use policy::FetchPolicy;
pub use response::{ErrorLocation, GraphQLError, Response};
pub use watcher::{QueryWatcher, WatchHandle};
