//! Custom scalar adapters.
//!
//! The cache always stores the raw wire value of a custom scalar. Adapters
//! translate between that raw value and the value handed to callers: `decode`
//! when reading (network or cache), `encode` when a caller writes data back.
//! The registry is explicit configuration; there is no process-wide default.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CacheError, Result};

/// Translates one custom scalar type between its raw and decoded forms.
pub trait CustomScalarAdapter: Send + Sync {
    fn decode(&self, raw: &Value) -> std::result::Result<Value, String>;
    fn encode(&self, value: &Value) -> std::result::Result<Value, String>;
}

/// Keeps the raw value as-is in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughAdapter;

impl CustomScalarAdapter for PassthroughAdapter {
    fn decode(&self, raw: &Value) -> std::result::Result<Value, String> {
        Ok(raw.clone())
    }

    fn encode(&self, value: &Value) -> std::result::Result<Value, String> {
        Ok(value.clone())
    }
}

type ConvertFn = dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync;

/// Adapter built from a pair of closures.
pub struct FnAdapter {
    decode: Box<ConvertFn>,
    encode: Box<ConvertFn>,
}

impl FnAdapter {
    pub fn new<D, E>(decode: D, encode: E) -> Self
    where
        D: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
        E: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            decode: Box::new(decode),
            encode: Box::new(encode),
        }
    }
}

impl CustomScalarAdapter for FnAdapter {
    fn decode(&self, raw: &Value) -> std::result::Result<Value, String> {
        (self.decode)(raw)
    }

    fn encode(&self, value: &Value) -> std::result::Result<Value, String> {
        (self.encode)(value)
    }
}

/// Adapters keyed by custom scalar type name.
#[derive(Clone, Default)]
pub struct ScalarAdapters {
    adapters: HashMap<String, Arc<dyn CustomScalarAdapter>>,
}

impl fmt::Debug for ScalarAdapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.adapters.keys().collect();
        types.sort();
        f.debug_struct("ScalarAdapters").field("types", &types).finish()
    }
}

impl ScalarAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        scalar_type: impl Into<String>,
        adapter: impl CustomScalarAdapter + 'static,
    ) {
        self.adapters.insert(scalar_type.into(), Arc::new(adapter));
    }

    pub fn with(
        mut self,
        scalar_type: impl Into<String>,
        adapter: impl CustomScalarAdapter + 'static,
    ) -> Self {
        self.register(scalar_type, adapter);
        self
    }

    pub fn contains(&self, scalar_type: &str) -> bool {
        self.adapters.contains_key(scalar_type)
    }

    /// The adapter for `scalar_type`; an unregistered type is fatal to the
    /// operation reading it.
    pub fn get(&self, scalar_type: &str) -> Result<&dyn CustomScalarAdapter> {
        self.adapters
            .get(scalar_type)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| CacheError::MissingScalarAdapter(scalar_type.to_string()))
    }

    pub fn decode(&self, scalar_type: &str, raw: &Value) -> Result<Value> {
        self.get(scalar_type)?
            .decode(raw)
            .map_err(|message| CacheError::ScalarAdapter {
                scalar_type: scalar_type.to_string(),
                message,
            })
    }

    pub fn encode(&self, scalar_type: &str, value: &Value) -> Result<Value> {
        self.get(scalar_type)?
            .encode(value)
            .map_err(|message| CacheError::ScalarAdapter {
                scalar_type: scalar_type.to_string(),
                message,
            })
    }
}
