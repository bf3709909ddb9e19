//! Field descriptors.
//!
//! A [`ResponseField`] is the unit every traversal works in: readers walk an
//! ordered list of them over a JSON or record source, writers record values
//! against them, and the field-key codec turns their name plus resolved
//! arguments into a cache key.
//!
//! Descriptors are plain data and (de)serialize with serde, so an operation
//! can be authored in JSON:
//!
//! ```json
//! {
//!   "name": "hero",
//!   "type": { "kind": "object", "of": [ { "name": "name", "type": { "kind": "string" } } ] },
//!   "arguments": { "episode": { "$var": "episode" } },
//!   "optional": true
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::variables::{VariableError, Variables};

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Long,
    Double,
    Boolean,
    Enum,
    Id,
    /// A custom scalar, decoded through the adapter registered for this type name.
    CustomScalar(String),
    /// A composite value with its own selection set.
    Object(Vec<ResponseField>),
    /// A list; elements may themselves be lists.
    List(Box<FieldType>),
}

impl FieldType {
    pub fn list_of(element: FieldType) -> Self {
        FieldType::List(Box::new(element))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldType::List(_))
    }

    /// Selections of this type, looking through any level of list nesting.
    pub fn selections(&self) -> &[ResponseField] {
        match self {
            FieldType::Object(selections) => selections,
            FieldType::List(element) => element.selections(),
            _ => &[],
        }
    }
}

/// A field argument value.
///
/// Variable references serialize as `{"$var": "name"}` (optionally with
/// `"optional": true`); any other JSON is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Variable {
        #[serde(rename = "$var")]
        name: String,
        #[serde(default, skip_serializing_if = "is_false")]
        optional: bool,
    },
    List(Vec<ArgumentValue>),
    Object(BTreeMap<String, ArgumentValue>),
    Literal(Value),
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ArgumentValue {
    /// A reference to a required variable.
    pub fn variable(name: impl Into<String>) -> Self {
        ArgumentValue::Variable {
            name: name.into(),
            optional: false,
        }
    }

    /// A reference to an optional variable; when absent the argument is dropped.
    pub fn optional_variable(name: impl Into<String>) -> Self {
        ArgumentValue::Variable {
            name: name.into(),
            optional: true,
        }
    }

    /// Substitute variables, returning `None` when the value is an absent
    /// optional variable.
    pub fn resolve(&self, variables: &Variables) -> Result<Option<Value>, VariableError> {
        match self {
            ArgumentValue::Variable { name, optional } => match variables.get(name) {
                Some(value) => Ok(Some(value.clone())),
                None if *optional => Ok(None),
                None => Err(VariableError::Missing(name.clone())),
            },
            ArgumentValue::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = item.resolve(variables)? {
                        resolved.push(value);
                    }
                }
                Ok(Some(Value::Array(resolved)))
            }
            ArgumentValue::Object(fields) => {
                let mut resolved = Map::new();
                for (name, value) in fields {
                    if let Some(value) = value.resolve(variables)? {
                        resolved.insert(name.clone(), value);
                    }
                }
                Ok(Some(Value::Object(resolved)))
            }
            ArgumentValue::Literal(value) => Ok(Some(value.clone())),
        }
    }
}

impl From<Value> for ArgumentValue {
    fn from(value: Value) -> Self {
        ArgumentValue::Literal(value)
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        ArgumentValue::Literal(Value::String(value.to_string()))
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        ArgumentValue::Literal(Value::from(value))
    }
}

impl From<i32> for ArgumentValue {
    fn from(value: i32) -> Self {
        ArgumentValue::Literal(Value::from(value))
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        ArgumentValue::Literal(Value::Bool(value))
    }
}

/// A condition gating whether a field is visited at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// `@include(if: $variable)`
    Include { variable: String },
    /// `@skip(if: $variable)`
    Skip { variable: String },
    /// Inline fragment `... on A` / `... on B`: visited only for these parent typenames.
    TypeName { types: Vec<String> },
}

impl Condition {
    pub fn include(variable: impl Into<String>) -> Self {
        Condition::Include {
            variable: variable.into(),
        }
    }

    pub fn skip(variable: impl Into<String>) -> Self {
        Condition::Skip {
            variable: variable.into(),
        }
    }

    pub fn type_name<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::TypeName {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the field passes this condition. `parent_typename` is the
    /// `__typename` of the object that owns the field, when known.
    pub fn passes(
        &self,
        variables: &Variables,
        parent_typename: Option<&str>,
    ) -> Result<bool, VariableError> {
        match self {
            Condition::Include { variable } => variables.boolean(variable),
            Condition::Skip { variable } => Ok(!variables.boolean(variable)?),
            Condition::TypeName { types } => {
                Ok(parent_typename.is_some_and(|t| types.iter().any(|candidate| candidate == t)))
            }
        }
    }
}

/// One selected field of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseField {
    /// Schema field name; used for the cache field key.
    pub name: String,
    /// Alias; when set the response carries the value under this name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, ArgumentValue>,
    /// Whether `null` (or absence) is an acceptable value.
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ResponseField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            field_type,
            arguments: BTreeMap::new(),
            optional: false,
            conditions: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Long)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Double)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn enum_value(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Enum)
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Id)
    }

    pub fn custom(name: impl Into<String>, scalar_type: impl Into<String>) -> Self {
        Self::new(name, FieldType::CustomScalar(scalar_type.into()))
    }

    pub fn object(name: impl Into<String>, selections: Vec<ResponseField>) -> Self {
        Self::new(name, FieldType::Object(selections))
    }

    pub fn list(name: impl Into<String>, element: FieldType) -> Self {
        Self::new(name, FieldType::list_of(element))
    }

    /// `__typename`, selected implicitly by most clients.
    pub fn typename() -> Self {
        Self::string("__typename")
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The key this field's value lives under in a response object.
    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn selections(&self) -> &[ResponseField] {
        self.field_type.selections()
    }

    /// Evaluate all conditions; `false` means the field must not be visited.
    pub fn is_included(
        &self,
        variables: &Variables,
        parent_typename: Option<&str>,
    ) -> Result<bool, VariableError> {
        for condition in &self.conditions {
            if !condition.passes(variables, parent_typename)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
