//! Loading operations, variables, and response payloads from JSON files.
//!
//! An operation file is the serde form of [`Operation`]: a name, an optional
//! kind and document, optional variables, and the root selections.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use gql_normalized_cache::{CacheKeyResolver, IdFieldResolver, NoIdentityResolver};
use gql_runtime_types::{Operation, Variables};
use serde_json::{Map, Value};

/// How entity identity is derived when normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolverKind {
    /// Every object is keyed by its path.
    #[default]
    Path,
    /// Objects with `id` (or `_id`) are keyed by it.
    Id,
    /// Like `Id`, prefixed with `__typename` (`Droid:2001`).
    TypenameId,
}

impl ResolverKind {
    pub fn build(self) -> Arc<dyn CacheKeyResolver> {
        match self {
            ResolverKind::Path => Arc::new(NoIdentityResolver),
            ResolverKind::Id => Arc::new(IdFieldResolver::new()),
            ResolverKind::TypenameId => Arc::new(IdFieldResolver::new().with_typename_prefix()),
        }
    }
}

impl std::str::FromStr for ResolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" | "none" => Ok(ResolverKind::Path),
            "id" => Ok(ResolverKind::Id),
            "typename-id" | "typename" => Ok(ResolverKind::TypenameId),
            other => Err(format!(
                "unknown resolver '{}' (expected path, id, or typename-id)",
                other
            )),
        }
    }
}

pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Load an operation, replacing its variables when a variables file is given.
pub fn load_operation(path: &Path, variables: Option<&Path>) -> Result<Operation> {
    let mut operation: Operation = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("Invalid operation in {}", path.display()))?;
    if let Some(variables_path) = variables {
        operation.variables = Variables::from_value(read_json(variables_path)?)
            .with_context(|| format!("Invalid variables in {}", variables_path.display()))?;
    }
    Ok(operation)
}

/// Load a response payload. Accepts either a full `{"data": ...}` envelope or
/// the bare data object.
pub fn load_response_data(path: &Path) -> Result<Map<String, Value>> {
    let value = read_json(path)?;
    let data = match value {
        Value::Object(mut envelope) if envelope.contains_key("data") => {
            envelope.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    match data {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "response data in {} is not an object: {}",
            path.display(),
            other
        )),
    }
}

/// Where the CLI keeps its cache snapshot when none is named.
pub fn default_snapshot_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gql-runtime")
        .join("cache.json")
}
