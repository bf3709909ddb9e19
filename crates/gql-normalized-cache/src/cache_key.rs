//! Entity identity policy.
//!
//! A [`CacheKeyResolver`] decides whether a JSON object has a stable global
//! identity. When it does, every occurrence of that entity across every
//! operation normalizes into the same record. When it does not, the
//! normalizer falls back to a path key derived from where the object sits.
//!
//! Resolvers must be deterministic: returning different keys for the same
//! object shape silently splits the record graph. Nothing checks this at
//! runtime.

use std::fmt;

use gql_runtime_types::{ResponseField, Variables};
use serde_json::{Map, Value};

/// A global record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Pluggable identity policy, passed explicitly to the store.
pub trait CacheKeyResolver: Send + Sync {
    /// Identity of `object`, reached through `field`, or `None` to embed it
    /// under a path key. Not called for the operation root.
    fn from_field_record_set(
        &self,
        field: &ResponseField,
        object: &Map<String, Value>,
    ) -> Option<CacheKey>;

    /// Identity implied by a field's arguments alone (e.g. `hero(id: "1000")`),
    /// letting a cache read jump straight to the entity.
    fn from_field_arguments(
        &self,
        _field: &ResponseField,
        _variables: &Variables,
    ) -> Option<CacheKey> {
        None
    }
}

impl<F> CacheKeyResolver for F
where
    F: Fn(&ResponseField, &Map<String, Value>) -> Option<CacheKey> + Send + Sync,
{
    fn from_field_record_set(
        &self,
        field: &ResponseField,
        object: &Map<String, Value>,
    ) -> Option<CacheKey> {
        self(field, object)
    }
}

/// The `__typename` of a raw response object, if selected.
pub fn type_name(object: &Map<String, Value>) -> Option<&str> {
    object.get("__typename").and_then(Value::as_str)
}

/// Default policy: no object has identity; everything is path-keyed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityResolver;

impl CacheKeyResolver for NoIdentityResolver {
    fn from_field_record_set(
        &self,
        _field: &ResponseField,
        _object: &Map<String, Value>,
    ) -> Option<CacheKey> {
        None
    }
}

/// Identity from an `id` (or `_id`) field, optionally namespaced by
/// `__typename` as `Type:id`.
#[derive(Debug, Clone, Default)]
pub struct IdFieldResolver {
    prefix_with_typename: bool,
    id_argument: Option<String>,
}

impl IdFieldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key entities as `Typename:id` so ids only need to be unique per type.
    pub fn with_typename_prefix(mut self) -> Self {
        self.prefix_with_typename = true;
        self
    }

    /// Resolve cache reads of fields taking this argument (e.g. `"id"`)
    /// directly to the entity. Only usable without the typename prefix, since
    /// the type is unknown before the object is read.
    pub fn with_id_argument(mut self, argument: impl Into<String>) -> Self {
        self.id_argument = Some(argument.into());
        self
    }

    fn id_of(object: &Map<String, Value>) -> Option<String> {
        ["id", "_id"].iter().find_map(|name| match object.get(*name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

impl CacheKeyResolver for IdFieldResolver {
    fn from_field_record_set(
        &self,
        _field: &ResponseField,
        object: &Map<String, Value>,
    ) -> Option<CacheKey> {
        let id = Self::id_of(object)?;
        if self.prefix_with_typename {
            let typename = type_name(object)?;
            return Some(CacheKey::new(format!("{}:{}", typename, id)));
        }
        Some(CacheKey::new(id))
    }

    fn from_field_arguments(
        &self,
        field: &ResponseField,
        variables: &Variables,
    ) -> Option<CacheKey> {
        if self.prefix_with_typename {
            return None;
        }
        let argument = field.arguments.get(self.id_argument.as_deref()?)?;
        match argument.resolve(variables).ok()?? {
            Value::String(s) => Some(CacheKey::new(s)),
            Value::Number(n) => Some(CacheKey::new(n.to_string())),
            _ => None,
        }
    }
}
