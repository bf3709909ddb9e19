//! Client configuration.
//!
//! Environment variables read by [`ClientConfig::from_env`]:
//!
//! - `GQL_ENDPOINT` - server URL (default: `http://localhost:4000/graphql`)
//! - `GQL_TIMEOUT_SECS` / `GQL_CONNECT_TIMEOUT_SECS` - HTTP timeouts (30 / 10)
//! - `GQL_RETRIES` - retries after a failed request (3)
//! - `GQL_FETCH_POLICY` - default fetch policy (`cache-first`)
//! - `GQL_CACHE_MAX_RECORDS` / `GQL_CACHE_MAX_BYTES` - LRU bounds (unbounded)
//! - `GQL_CACHE_TTL_SECS` - expire records this long after they were written

use std::time::Duration;

use gql_normalized_cache::EvictionPolicy;
use gql_runtime_types::{env_var, env_var_or, RetryConfig};
use gql_transport::resolve_endpoint;
use serde::{Deserialize, Serialize};

use crate::policy::FetchPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
    #[serde(default)]
    pub fetch_policy: FetchPolicy,
    #[serde(default)]
    pub eviction: EvictionPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: resolve_endpoint(None),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            fetch_policy: FetchPolicy::default(),
            eviction: EvictionPolicy::NO_EVICTION,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut eviction = EvictionPolicy::NO_EVICTION;
        if let Some(max) = env_var::<usize>("GQL_CACHE_MAX_RECORDS") {
            eviction = eviction.max_records(max);
        }
        if let Some(max) = env_var::<usize>("GQL_CACHE_MAX_BYTES") {
            eviction = eviction.max_size_bytes(max);
        }
        if let Some(secs) = env_var::<u64>("GQL_CACHE_TTL_SECS") {
            eviction = eviction.expire_after_write(Duration::from_secs(secs));
        }

        Self {
            endpoint: defaults.endpoint,
            request_timeout: Duration::from_secs(env_var_or(
                "GQL_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            connect_timeout: Duration::from_secs(env_var_or(
                "GQL_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            retry: RetryConfig {
                retries: env_var_or("GQL_RETRIES", defaults.retry.retries),
                ..defaults.retry
            },
            fetch_policy: env_var_or("GQL_FETCH_POLICY", defaults.fetch_policy),
            eviction,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }
}
