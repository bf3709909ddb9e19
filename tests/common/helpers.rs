//! Temp-file and client construction helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gql_runtime::{CacheStore, FetchPolicy, GraphQLClient, ReplayTransport};
use serde::Serialize;

/// Serialize `value` as pretty JSON into `dir/name`.
pub fn write_json(dir: &Path, name: &str, value: &impl Serialize) -> PathBuf {
    let path = dir.join(name);
    let text = serde_json::to_string_pretty(value).expect("fixture should serialize");
    std::fs::write(&path, text).expect("fixture should be writable");
    path
}

/// A client over `store` whose network is the returned replay transport.
pub fn replay_client(
    store: Arc<CacheStore>,
    policy: FetchPolicy,
) -> (GraphQLClient, Arc<ReplayTransport>) {
    let transport = Arc::new(ReplayTransport::new());
    let client = GraphQLClient::builder()
        .shared_transport(transport.clone())
        .store(store)
        .fetch_policy(policy)
        .build();
    (client, transport)
}
