//! Field-by-field reading of response data.
//!
//! [`ResponseReader`] walks an ordered selection list over a [`ValueSource`]
//! and does three things at once:
//!
//! 1. builds the response-shaped JSON the caller receives (custom scalars
//!    decoded through their adapters)
//! 2. enforces the descriptor contract: required fields must be present and
//!    non-null, and values must match their declared type
//! 3. emits the [`ResolveDelegate`] event sequence for whatever delegate is
//!    attached (normalizer, JSON emitter, or nothing)
//!
//! Fields excluded by `@skip`/`@include` or a type condition are not visited
//! and fire no events.

mod cache_source;
mod json_source;

pub use cache_source::CacheSource;
pub use json_source::JsonSource;

use gql_runtime_types::{FieldType, ResponseField, Variables};
use serde_json::{Map, Value};

use crate::delegate::ResolveDelegate;
use crate::error::{CacheError, Result};
use crate::scalar::ScalarAdapters;

/// One field value as seen by a reader, before type checking.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue<O> {
    Null,
    Scalar(Value),
    Object(O),
    List(Vec<SourceValue<O>>),
}

/// Where a reader gets field values from.
pub trait ValueSource {
    /// The object representation handed to delegates.
    type Object;

    /// Value of `field` in `object`. `Ok(None)` means the field is absent;
    /// sources that cannot tell absence from a miss return an error instead.
    fn field_value(
        &mut self,
        object: &Self::Object,
        field: &ResponseField,
        variables: &Variables,
    ) -> Result<Option<SourceValue<Self::Object>>>;

    /// `__typename` of `object`, used for type conditions.
    fn type_name(&self, object: &Self::Object) -> Option<String>;
}

/// Drives a [`ValueSource`] through a selection set.
pub struct ResponseReader<'a, S> {
    source: S,
    variables: &'a Variables,
    adapters: &'a ScalarAdapters,
}

impl<'a, S: ValueSource> ResponseReader<'a, S> {
    pub fn new(source: S, variables: &'a Variables, adapters: &'a ScalarAdapters) -> Self {
        Self {
            source,
            variables,
            adapters,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Read `selections` out of `root`, a record or payload object stored
    /// under `root_key`.
    pub fn read<D>(
        &mut self,
        root_key: &str,
        root: &S::Object,
        selections: &[ResponseField],
        delegate: &mut D,
    ) -> Result<Map<String, Value>>
    where
        D: ResolveDelegate<S::Object>,
    {
        delegate.will_resolve_root(root_key);
        self.read_object(root, selections, delegate)
    }

    fn read_object<D>(
        &mut self,
        object: &S::Object,
        selections: &[ResponseField],
        delegate: &mut D,
    ) -> Result<Map<String, Value>>
    where
        D: ResolveDelegate<S::Object>,
    {
        let typename = self.source.type_name(object);
        let mut out = Map::new();
        for field in selections {
            if !field.is_included(self.variables, typename.as_deref())? {
                continue;
            }
            delegate.will_resolve(field, self.variables)?;
            let value = self.source.field_value(object, field, self.variables)?;
            let resolved = self.read_value(field, &field.field_type, value, true, delegate)?;
            delegate.did_resolve(field, self.variables)?;
            out.insert(field.response_name().to_string(), resolved);
        }
        Ok(out)
    }

    fn read_value<D>(
        &mut self,
        field: &ResponseField,
        field_type: &FieldType,
        value: Option<SourceValue<S::Object>>,
        top_level: bool,
        delegate: &mut D,
    ) -> Result<Value>
    where
        D: ResolveDelegate<S::Object>,
    {
        if let FieldType::CustomScalar(scalar_type) = field_type {
            self.adapters.get(scalar_type)?;
        }

        let value = match value {
            None | Some(SourceValue::Null) => {
                if top_level && !field.optional {
                    return Err(CacheError::CorruptedData {
                        field: field.response_name().to_string(),
                    });
                }
                delegate.did_resolve_null();
                return Ok(Value::Null);
            }
            Some(value) => value,
        };

        match (field_type, value) {
            (FieldType::CustomScalar(scalar_type), SourceValue::Scalar(raw)) => {
                let decoded = self.adapters.decode(scalar_type, &raw)?;
                delegate.did_resolve_scalar(&raw);
                Ok(decoded)
            }
            (FieldType::Object(selections), SourceValue::Object(object)) => {
                delegate.will_resolve_object(field, &object)?;
                let map = self.read_object(&object, selections, delegate)?;
                delegate.did_resolve_object(field, &object)?;
                Ok(Value::Object(map))
            }
            (FieldType::List(element), SourceValue::List(items)) => {
                let len = items.len();
                let mut out = Vec::with_capacity(len);
                for (index, item) in items.into_iter().enumerate() {
                    delegate.will_resolve_element(index);
                    out.push(self.read_value(field, element, Some(item), false, delegate)?);
                    delegate.did_resolve_element(index);
                }
                delegate.did_resolve_list(len);
                Ok(Value::Array(out))
            }
            (scalar_type, SourceValue::Scalar(raw)) if scalar_matches(scalar_type, &raw) => {
                delegate.did_resolve_scalar(&raw);
                Ok(raw)
            }
            (expected, _) => Err(CacheError::TypeMismatch {
                field: field.response_name().to_string(),
                expected: type_label(expected).to_string(),
            }),
        }
    }
}

fn scalar_matches(field_type: &FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String | FieldType::Enum => value.is_string(),
        FieldType::Id => value.is_string() || value.is_number(),
        FieldType::Int => value
            .as_i64()
            .is_some_and(|n| i32::try_from(n).is_ok()),
        FieldType::Long => value.is_i64() || value.is_u64(),
        FieldType::Double => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::CustomScalar(_) | FieldType::Object(_) | FieldType::List(_) => false,
    }
}

pub(crate) fn type_label(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::String => "a string",
        FieldType::Int => "a 32-bit integer",
        FieldType::Long => "an integer",
        FieldType::Double => "a number",
        FieldType::Boolean => "a boolean",
        FieldType::Enum => "an enum string",
        FieldType::Id => "an id",
        FieldType::CustomScalar(_) => "a custom scalar",
        FieldType::Object(_) => "an object",
        FieldType::List(_) => "a list",
    }
}
