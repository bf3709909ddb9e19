use gql_runtime_types::{FieldType, ResponseField, Variables};
use serde_json::{Map, Value};

use super::{SourceValue, ValueSource};
use crate::error::Result;

/// Reads a response payload already parsed into JSON. Values are looked up
/// by response name (alias when present).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSource;

impl JsonSource {
    fn convert(value: &Value, field_type: &FieldType) -> SourceValue<Map<String, Value>> {
        match (value, field_type) {
            (Value::Null, _) => SourceValue::Null,
            // A custom scalar's raw value may itself be an object or array.
            (_, FieldType::CustomScalar(_)) => SourceValue::Scalar(value.clone()),
            (Value::Array(items), FieldType::List(element)) => SourceValue::List(
                items
                    .iter()
                    .map(|item| Self::convert(item, element))
                    .collect(),
            ),
            (Value::Object(map), FieldType::Object(_)) => SourceValue::Object(map.clone()),
            _ => SourceValue::Scalar(value.clone()),
        }
    }
}

impl ValueSource for JsonSource {
    type Object = Map<String, Value>;

    fn field_value(
        &mut self,
        object: &Self::Object,
        field: &ResponseField,
        _variables: &Variables,
    ) -> Result<Option<SourceValue<Self::Object>>> {
        Ok(object
            .get(field.response_name())
            .map(|value| Self::convert(value, &field.field_type)))
    }

    fn type_name(&self, object: &Self::Object) -> Option<String> {
        object
            .get("__typename")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
