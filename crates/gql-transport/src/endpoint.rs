//! Endpoint resolution.

use gql_runtime_types::env_string_or;

/// Used when neither the caller nor the environment names a server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";

/// Environment variable consulted when the caller names no endpoint.
pub const ENDPOINT_ENV: &str = "GQL_ENDPOINT";

/// Pick the endpoint to talk to.
///
/// Order: a non-blank `explicit` URL, then `GQL_ENDPOINT` if set and
/// non-blank, then [`DEFAULT_ENDPOINT`]. A bare origin (`https://host` or
/// `https://host/`) gets the conventional `/graphql` path appended.
pub fn resolve_endpoint(explicit: Option<&str>) -> String {
    let url = match explicit.map(str::trim).filter(|c| !c.is_empty()) {
        Some(url) => url.to_string(),
        None => env_string_or(ENDPOINT_ENV, DEFAULT_ENDPOINT),
    };
    normalize_endpoint(url.trim())
}

fn normalize_endpoint(url: &str) -> String {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let has_path = after_scheme
        .split_once('/')
        .map(|(_, path)| !path.is_empty())
        .unwrap_or(false);
    if has_path {
        url.to_string()
    } else {
        format!("{}/graphql", url.trim_end_matches('/'))
    }
}

/// Whether the endpoint looks like a loopback server (used to tune logging).
pub fn is_local_endpoint(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("://localhost") || lower.contains("://127.0.0.1") || lower.contains("://[::1]")
}
