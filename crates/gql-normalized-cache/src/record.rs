//! Records: the flat unit of the normalized cache.
//!
//! A [`Record`] maps field keys to [`RecordValue`]s. Nested objects never
//! live inside a record; they are separate records and the parent holds a
//! [`CacheReference`] naming them. Dereferencing is always a store lookup, so
//! the record graph may contain cycles.
//!
//! Merging is a right-biased union: incoming fields overwrite same-keyed
//! fields, fields only present in the stored record survive, nothing is ever
//! deleted by a merge.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// JSON marker key for references in serialized records.
const REFERENCE_MARKER: &str = "$ref";
/// JSON marker key for composite custom-scalar values in serialized records.
const JSON_MARKER: &str = "$json";

/// Name of another record. Never a pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheReference {
    key: String,
}

impl CacheReference {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheReference({})", self.key)
    }
}

/// A value stored under one field key.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    /// Composite raw value of a custom scalar (JSON object or array).
    Json(Value),
    Reference(CacheReference),
    List(Vec<RecordValue>),
}

impl RecordValue {
    /// Wrap a raw scalar as received on the wire.
    pub fn from_scalar(value: &Value) -> Self {
        match value {
            Value::Null => RecordValue::Null,
            Value::Bool(b) => RecordValue::Boolean(*b),
            Value::Number(n) => RecordValue::Number(n.clone()),
            Value::String(s) => RecordValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => RecordValue::Json(value.clone()),
        }
    }

    /// Raw scalar JSON, or `None` for references and lists.
    pub fn as_scalar(&self) -> Option<Value> {
        match self {
            RecordValue::Null => Some(Value::Null),
            RecordValue::Boolean(b) => Some(Value::Bool(*b)),
            RecordValue::Number(n) => Some(Value::Number(n.clone())),
            RecordValue::String(s) => Some(Value::String(s.clone())),
            RecordValue::Json(v) => Some(v.clone()),
            RecordValue::Reference(_) | RecordValue::List(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&CacheReference> {
        match self {
            RecordValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }

    /// Every reference reachable inside this value, in order.
    pub fn references(&self) -> Vec<&CacheReference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a CacheReference>) {
        match self {
            RecordValue::Reference(r) => out.push(r),
            RecordValue::List(items) => items.iter().for_each(|i| i.collect_references(out)),
            _ => {}
        }
    }

    fn size_estimate(&self) -> usize {
        match self {
            RecordValue::Null | RecordValue::Boolean(_) => 8,
            RecordValue::Number(_) => 16,
            RecordValue::String(s) => s.len() + 8,
            RecordValue::Json(v) => v.to_string().len() + 8,
            RecordValue::Reference(r) => r.key.len() + 8,
            RecordValue::List(items) => 8 + items.iter().map(Self::size_estimate).sum::<usize>(),
        }
    }

    /// JSON form used by snapshots: references become `{"$ref": key}`,
    /// composite scalars `{"$json": value}`.
    pub fn to_json(&self) -> Value {
        match self {
            RecordValue::Reference(r) => {
                let mut map = Map::new();
                map.insert(REFERENCE_MARKER.to_string(), Value::String(r.key.clone()));
                Value::Object(map)
            }
            RecordValue::Json(v) => {
                let mut map = Map::new();
                map.insert(JSON_MARKER.to_string(), v.clone());
                Value::Object(map)
            }
            RecordValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            other => other.as_scalar().unwrap_or(Value::Null),
        }
    }

    /// Inverse of [`RecordValue::to_json`].
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                RecordValue::List(items.into_iter().map(Self::from_json).collect())
            }
            Value::Object(mut map) if map.len() == 1 => {
                if let Some(Value::String(key)) = map.get(REFERENCE_MARKER) {
                    return RecordValue::Reference(CacheReference::new(key.clone()));
                }
                match map.remove(JSON_MARKER) {
                    Some(inner) => RecordValue::Json(inner),
                    None => RecordValue::Json(Value::Object(map)),
                }
            }
            other => RecordValue::from_scalar(&other),
        }
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(RecordValue::from_json)
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::String(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::String(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        RecordValue::Boolean(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Number(value.into())
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(RecordValue::Number)
            .unwrap_or(RecordValue::Null)
    }
}

impl From<CacheReference> for RecordValue {
    fn from(value: CacheReference) -> Self {
        RecordValue::Reference(value)
    }
}

impl<T: Into<RecordValue>> From<Vec<T>> for RecordValue {
    fn from(values: Vec<T>) -> Self {
        RecordValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// One logical entity or embedded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: String,
    fields: BTreeMap<String, RecordValue>,
}

impl Record {
    pub fn builder(key: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(&self, field_key: &str) -> Option<&RecordValue> {
        self.fields.get(field_key)
    }

    pub fn has_field(&self, field_key: &str) -> bool {
        self.fields.contains_key(field_key)
    }

    pub fn fields(&self) -> &BTreeMap<String, RecordValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Qualified `recordKey.fieldKey` names of every field.
    pub fn field_keys(&self) -> BTreeSet<String> {
        self.fields
            .keys()
            .map(|field| format!("{}.{}", self.key, field))
            .collect()
    }

    /// Every reference held by any field.
    pub fn references(&self) -> Vec<&CacheReference> {
        self.fields
            .values()
            .flat_map(RecordValue::references)
            .collect()
    }

    /// Approximate heap weight, used by size-bounded eviction.
    pub fn size_estimate_bytes(&self) -> usize {
        self.key.len()
            + self
                .fields
                .iter()
                .map(|(k, v)| k.len() + v.size_estimate())
                .sum::<usize>()
    }

    /// Right-biased merge of `other` into `self`.
    ///
    /// Returns the field keys whose stored value actually changed; writing an
    /// identical value is not a change.
    pub fn merge_from(&mut self, other: &Record) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for (field_key, value) in &other.fields {
            let differs = self.fields.get(field_key) != Some(value);
            if differs {
                self.fields.insert(field_key.clone(), value.clone());
                changed.insert(field_key.clone());
            }
        }
        changed
    }

    pub fn to_builder(&self) -> RecordBuilder {
        RecordBuilder {
            key: self.key.clone(),
            fields: self.fields.clone(),
        }
    }
}

/// Accumulates fields for a record under construction.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    key: String,
    fields: BTreeMap<String, RecordValue>,
}

impl RecordBuilder {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(mut self, field_key: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.add_field(field_key, value);
        self
    }

    pub fn add_field(&mut self, field_key: impl Into<String>, value: impl Into<RecordValue>) {
        self.fields.insert(field_key.into(), value.into());
    }

    pub fn build(self) -> Record {
        Record {
            key: self.key,
            fields: self.fields,
        }
    }
}
