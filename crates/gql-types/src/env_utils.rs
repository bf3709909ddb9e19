//! Environment variable parsing utilities.
//!
//! Client configuration (`GQL_ENDPOINT`, `GQL_TIMEOUT_SECS`, cache limits, ...)
//! is read through these helpers so every crate applies the same rules:
//! unset or unparsable values fall back to the default.
//!
//! # Example
//!
//! ```
//! use gql_runtime_types::env_utils::{env_string_or, env_var, env_var_or};
//!
//! let timeout: u64 = env_var_or("GQL_TIMEOUT_SECS", 30);
//! let max_records: Option<usize> = env_var("GQL_CACHE_MAX_RECORDS");
//! let endpoint = env_string_or("GQL_ENDPOINT", "http://localhost:4000/graphql");
//! # let _ = (timeout, max_records, endpoint);
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Get an environment variable as a string, falling back when unset or blank.
pub fn env_string_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}
