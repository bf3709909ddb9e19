//! Runtime operation variables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while resolving variables referenced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("required variable `${0}` was not provided")]
    Missing(String),

    #[error("variable `${name}` must be {expected}")]
    Invalid { name: String, expected: &'static str },

    #[error("operation variables must be a JSON object")]
    NotAnObject,
}

/// Variables supplied for one operation execution.
///
/// An absent variable and a variable explicitly set to `null` are different:
/// the former can drop an optional argument from a field key entirely, the
/// latter encodes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(Map<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build variables from a JSON value. `null` is treated as no variables.
    pub fn from_value(value: Value) -> Result<Self, VariableError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            _ => Err(VariableError::NotAnObject),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Read a boolean variable, as used by `@skip(if: $v)` / `@include(if: $v)`.
    pub fn boolean(&self, name: &str) -> Result<bool, VariableError> {
        match self.0.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(VariableError::Invalid {
                name: name.to_string(),
                expected: "a boolean",
            }),
            None => Err(VariableError::Missing(name.to_string())),
        }
    }
}

impl From<Map<String, Value>> for Variables {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
