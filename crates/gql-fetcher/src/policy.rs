//! Fetch policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordering and fallback between the cache and the network for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Read the cache only; a miss yields a response without data.
    CacheOnly,
    /// Always fetch; never read the cache.
    NetworkOnly,
    /// Serve a complete cache hit, otherwise fetch.
    #[default]
    CacheFirst,
    /// Fetch, falling back to the cache when the fetch fails.
    NetworkFirst,
    /// Emit the cached data (if any), then the fetched data.
    CacheAndNetwork,
}

impl FetchPolicy {
    pub const ALL: [FetchPolicy; 5] = [
        FetchPolicy::CacheOnly,
        FetchPolicy::NetworkOnly,
        FetchPolicy::CacheFirst,
        FetchPolicy::NetworkFirst,
        FetchPolicy::CacheAndNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPolicy::CacheOnly => "cache-only",
            FetchPolicy::NetworkOnly => "network-only",
            FetchPolicy::CacheFirst => "cache-first",
            FetchPolicy::NetworkFirst => "network-first",
            FetchPolicy::CacheAndNetwork => "cache-and-network",
        }
    }

    pub fn reads_cache(&self) -> bool {
        !matches!(self, FetchPolicy::NetworkOnly)
    }

    pub fn may_fetch(&self) -> bool {
        !matches!(self, FetchPolicy::CacheOnly)
    }
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchPolicy {
    type Err = String;

    /// Accepts `cache-first`, `cache_first`, and `CACHE_FIRST` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        FetchPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown fetch policy '{}' (expected one of: {})",
                    s,
                    FetchPolicy::ALL.map(|p| p.as_str()).join(", ")
                )
            })
    }
}
