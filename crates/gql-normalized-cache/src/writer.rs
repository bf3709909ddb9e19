//! Building response values locally and replaying them as events.
//!
//! [`ResponseWriter`] is the inverse of the reader: callers describe a typed
//! value tree with `write_*` calls, the writer buffers it in selection order,
//! and [`ResponseWriter::resolve`] replays the buffer as the same
//! [`ResolveDelegate`] events a reader emits. Attaching a
//! [`ResponseNormalizer`](crate::normalizer::ResponseNormalizer) turns a local
//! value into records; attaching a [`JsonEmitter`] turns it into wire JSON.
//!
//! Custom scalars are encoded through their adapter at write time, so the
//! buffer only ever holds raw wire values.

use gql_runtime_types::{FieldType, ResponseField, Variables};
use serde_json::{Map, Number, Value};

use crate::delegate::ResolveDelegate;
use crate::error::{CacheError, Result};
use crate::reader::type_label;
use crate::scalar::ScalarAdapters;

/// A buffered value.
#[derive(Debug, Clone, PartialEq)]
pub enum WrittenValue {
    Null,
    Scalar(Value),
    Object(Vec<(ResponseField, WrittenValue)>),
    List(Vec<WrittenValue>),
}

impl WrittenValue {
    /// Response-shaped raw JSON of this value.
    pub fn to_json(&self) -> Value {
        match self {
            WrittenValue::Null => Value::Null,
            WrittenValue::Scalar(value) => value.clone(),
            WrittenValue::Object(entries) => Value::Object(raw_map(entries)),
            WrittenValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn raw_map(entries: &[(ResponseField, WrittenValue)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(field, value)| (field.response_name().to_string(), value.to_json()))
        .collect()
}

fn optional_scalar<T: Into<Value>>(value: Option<T>) -> WrittenValue {
    value.map_or(WrittenValue::Null, |v| WrittenValue::Scalar(v.into()))
}

fn double(value: Option<f64>) -> WrittenValue {
    value
        .and_then(Number::from_f64)
        .map_or(WrittenValue::Null, |n| WrittenValue::Scalar(Value::Number(n)))
}

/// Buffers the fields of one object.
pub struct ResponseWriter<'a> {
    adapters: &'a ScalarAdapters,
    entries: Vec<(ResponseField, WrittenValue)>,
}

impl<'a> ResponseWriter<'a> {
    pub fn new(adapters: &'a ScalarAdapters) -> Self {
        Self {
            adapters,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[(ResponseField, WrittenValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Response-shaped raw JSON of everything written so far.
    pub fn to_json(&self) -> Map<String, Value> {
        raw_map(&self.entries)
    }

    fn push(&mut self, field: &ResponseField, value: WrittenValue) -> Result<()> {
        if matches!(value, WrittenValue::Null) && !field.optional {
            return Err(CacheError::CorruptedData {
                field: field.response_name().to_string(),
            });
        }
        self.entries.push((field.clone(), value));
        Ok(())
    }

    pub fn write_string(&mut self, field: &ResponseField, value: Option<&str>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    pub fn write_int(&mut self, field: &ResponseField, value: Option<i32>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    pub fn write_long(&mut self, field: &ResponseField, value: Option<i64>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    pub fn write_double(&mut self, field: &ResponseField, value: Option<f64>) -> Result<()> {
        self.push(field, double(value))
    }

    pub fn write_boolean(&mut self, field: &ResponseField, value: Option<bool>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    pub fn write_enum(&mut self, field: &ResponseField, value: Option<&str>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    pub fn write_id(&mut self, field: &ResponseField, value: Option<&str>) -> Result<()> {
        self.push(field, optional_scalar(value))
    }

    /// Write a decoded custom scalar; it is stored in its encoded raw form.
    pub fn write_custom(&mut self, field: &ResponseField, value: Option<&Value>) -> Result<()> {
        let FieldType::CustomScalar(scalar_type) = &field.field_type else {
            return Err(CacheError::TypeMismatch {
                field: field.response_name().to_string(),
                expected: type_label(&field.field_type).to_string(),
            });
        };
        self.adapters.get(scalar_type)?;
        let written = match value {
            Some(Value::Null) | None => WrittenValue::Null,
            Some(value) => WrittenValue::Scalar(self.adapters.encode(scalar_type, value)?),
        };
        self.push(field, written)
    }

    pub fn write_null(&mut self, field: &ResponseField) -> Result<()> {
        self.push(field, WrittenValue::Null)
    }

    /// Write a nested object; `marshal` fills in its fields. A null object
    /// is written with [`ResponseWriter::write_null`].
    pub fn write_object<F>(&mut self, field: &ResponseField, marshal: F) -> Result<()>
    where
        F: FnOnce(&mut ResponseWriter<'a>) -> Result<()>,
    {
        let mut nested = ResponseWriter::new(self.adapters);
        marshal(&mut nested)?;
        self.push(field, WrittenValue::Object(nested.entries))
    }

    /// Write a list; `marshal` appends its elements in order.
    pub fn write_list<F>(&mut self, field: &ResponseField, marshal: F) -> Result<()>
    where
        F: FnOnce(&mut ListItemWriter<'a>) -> Result<()>,
    {
        let mut items = ListItemWriter::new(self.adapters);
        marshal(&mut items)?;
        self.push(field, WrittenValue::List(items.items))
    }

    /// Replay the buffer as delegate events for a value rooted at `root_key`.
    pub fn resolve<D>(&self, root_key: &str, variables: &Variables, delegate: &mut D) -> Result<()>
    where
        D: ResolveDelegate<Map<String, Value>>,
    {
        delegate.will_resolve_root(root_key);
        resolve_fields(&self.entries, variables, delegate)
    }
}

fn resolve_fields<D>(
    entries: &[(ResponseField, WrittenValue)],
    variables: &Variables,
    delegate: &mut D,
) -> Result<()>
where
    D: ResolveDelegate<Map<String, Value>>,
{
    for (field, value) in entries {
        delegate.will_resolve(field, variables)?;
        resolve_value(field, value, variables, delegate)?;
        delegate.did_resolve(field, variables)?;
    }
    Ok(())
}

fn resolve_value<D>(
    field: &ResponseField,
    value: &WrittenValue,
    variables: &Variables,
    delegate: &mut D,
) -> Result<()>
where
    D: ResolveDelegate<Map<String, Value>>,
{
    match value {
        WrittenValue::Null => delegate.did_resolve_null(),
        WrittenValue::Scalar(raw) => delegate.did_resolve_scalar(raw),
        WrittenValue::Object(entries) => {
            let raw = raw_map(entries);
            delegate.will_resolve_object(field, &raw)?;
            resolve_fields(entries, variables, delegate)?;
            delegate.did_resolve_object(field, &raw)?;
        }
        WrittenValue::List(items) => {
            for (index, item) in items.iter().enumerate() {
                delegate.will_resolve_element(index);
                resolve_value(field, item, variables, delegate)?;
                delegate.did_resolve_element(index);
            }
            delegate.did_resolve_list(items.len());
        }
    }
    Ok(())
}

/// Appends list elements.
pub struct ListItemWriter<'a> {
    adapters: &'a ScalarAdapters,
    items: Vec<WrittenValue>,
}

impl<'a> ListItemWriter<'a> {
    fn new(adapters: &'a ScalarAdapters) -> Self {
        Self {
            adapters,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn write_string(&mut self, value: Option<&str>) {
        self.items.push(optional_scalar(value));
    }

    pub fn write_int(&mut self, value: Option<i32>) {
        self.items.push(optional_scalar(value));
    }

    pub fn write_long(&mut self, value: Option<i64>) {
        self.items.push(optional_scalar(value));
    }

    pub fn write_double(&mut self, value: Option<f64>) {
        self.items.push(double(value));
    }

    pub fn write_boolean(&mut self, value: Option<bool>) {
        self.items.push(optional_scalar(value));
    }

    pub fn write_custom(&mut self, scalar_type: &str, value: Option<&Value>) -> Result<()> {
        let written = match value {
            Some(Value::Null) | None => {
                self.adapters.get(scalar_type)?;
                WrittenValue::Null
            }
            Some(value) => WrittenValue::Scalar(self.adapters.encode(scalar_type, value)?),
        };
        self.items.push(written);
        Ok(())
    }

    pub fn write_null(&mut self) {
        self.items.push(WrittenValue::Null);
    }

    pub fn write_object<F>(&mut self, marshal: F) -> Result<()>
    where
        F: FnOnce(&mut ResponseWriter<'a>) -> Result<()>,
    {
        let mut nested = ResponseWriter::new(self.adapters);
        marshal(&mut nested)?;
        self.items.push(WrittenValue::Object(nested.entries));
        Ok(())
    }

    pub fn write_list<F>(&mut self, marshal: F) -> Result<()>
    where
        F: FnOnce(&mut ListItemWriter<'a>) -> Result<()>,
    {
        let mut nested = ListItemWriter::new(self.adapters);
        marshal(&mut nested)?;
        self.items.push(WrittenValue::List(nested.items));
        Ok(())
    }
}

/// Writes response-shaped JSON through a [`ResponseWriter`], honoring the
/// selections' conditions and encoding custom scalars. Lets any serializable
/// value be written into the cache.
pub struct JsonMarshaller<'v> {
    variables: &'v Variables,
}

impl<'v> JsonMarshaller<'v> {
    pub fn new(variables: &'v Variables) -> Self {
        Self { variables }
    }

    pub fn marshal(
        &self,
        writer: &mut ResponseWriter<'_>,
        selections: &[ResponseField],
        data: &Map<String, Value>,
    ) -> Result<()> {
        let typename = data.get("__typename").and_then(Value::as_str);
        for field in selections {
            if !field.is_included(self.variables, typename)? {
                continue;
            }
            self.marshal_field(writer, field, data.get(field.response_name()))?;
        }
        Ok(())
    }

    fn marshal_field(
        &self,
        writer: &mut ResponseWriter<'_>,
        field: &ResponseField,
        value: Option<&Value>,
    ) -> Result<()> {
        let mismatch = || CacheError::TypeMismatch {
            field: field.response_name().to_string(),
            expected: type_label(&field.field_type).to_string(),
        };

        if let FieldType::CustomScalar(_) = field.field_type {
            return writer.write_custom(field, value);
        }
        let value = match value {
            None | Some(Value::Null) => return writer.write_null(field),
            Some(value) => value,
        };

        match &field.field_type {
            FieldType::String | FieldType::Enum => {
                writer.write_string(field, Some(value.as_str().ok_or_else(mismatch)?))
            }
            FieldType::Id => match value {
                Value::String(s) => writer.write_id(field, Some(s)),
                Value::Number(n) => writer.write_id(field, Some(&n.to_string())),
                _ => Err(mismatch()),
            },
            FieldType::Int | FieldType::Long => {
                writer.write_long(field, Some(value.as_i64().ok_or_else(mismatch)?))
            }
            FieldType::Double => {
                writer.write_double(field, Some(value.as_f64().ok_or_else(mismatch)?))
            }
            FieldType::Boolean => {
                writer.write_boolean(field, Some(value.as_bool().ok_or_else(mismatch)?))
            }
            FieldType::Object(selections) => {
                let object = value.as_object().ok_or_else(mismatch)?;
                writer.write_object(field, |nested| self.marshal(nested, selections, object))
            }
            FieldType::List(element) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                writer.write_list(field, |list| self.marshal_items(list, field, element, items))
            }
            FieldType::CustomScalar(_) => Err(mismatch()),
        }
    }

    fn marshal_items(
        &self,
        list: &mut ListItemWriter<'_>,
        field: &ResponseField,
        element: &FieldType,
        items: &[Value],
    ) -> Result<()> {
        let mismatch = || CacheError::TypeMismatch {
            field: field.response_name().to_string(),
            expected: type_label(element).to_string(),
        };
        for item in items {
            if let FieldType::CustomScalar(scalar_type) = element {
                list.write_custom(scalar_type, Some(item))?;
                continue;
            }
            if item.is_null() {
                list.write_null();
                continue;
            }
            match element {
                FieldType::String | FieldType::Enum => {
                    list.write_string(Some(item.as_str().ok_or_else(mismatch)?))
                }
                FieldType::Id => match item {
                    Value::String(s) => list.write_string(Some(s)),
                    Value::Number(n) => list.write_string(Some(&n.to_string())),
                    _ => return Err(mismatch()),
                },
                FieldType::Int | FieldType::Long => {
                    list.write_long(Some(item.as_i64().ok_or_else(mismatch)?))
                }
                FieldType::Double => list.write_double(Some(item.as_f64().ok_or_else(mismatch)?)),
                FieldType::Boolean => list.write_boolean(Some(item.as_bool().ok_or_else(mismatch)?)),
                FieldType::Object(selections) => {
                    let object = item.as_object().ok_or_else(mismatch)?;
                    list.write_object(|nested| self.marshal(nested, selections, object))?
                }
                FieldType::List(inner) => {
                    let nested_items = item.as_array().ok_or_else(mismatch)?;
                    list.write_list(|nested| self.marshal_items(nested, field, inner, nested_items))?
                }
                FieldType::CustomScalar(_) => return Err(mismatch()),
            }
        }
        Ok(())
    }
}

/// Delegate that assembles response-shaped JSON from the event stream.
#[derive(Debug, Default)]
pub struct JsonEmitter {
    objects: Vec<Map<String, Value>>,
    names: Vec<String>,
    values: Vec<Value>,
}

impl JsonEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The emitted root object.
    pub fn finish(mut self) -> Result<Map<String, Value>> {
        if self.objects.len() != 1 || !self.names.is_empty() || !self.values.is_empty() {
            return Err(CacheError::InvalidData(
                "unbalanced resolve events".to_string(),
            ));
        }
        self.objects
            .pop()
            .ok_or_else(|| CacheError::InvalidData("no root object".to_string()))
    }
}

impl<R> ResolveDelegate<R> for JsonEmitter {
    fn will_resolve_root(&mut self, _root_key: &str) {
        self.objects.clear();
        self.names.clear();
        self.values.clear();
        self.objects.push(Map::new());
    }

    fn will_resolve(&mut self, field: &ResponseField, _variables: &Variables) -> Result<()> {
        self.names.push(field.response_name().to_string());
        Ok(())
    }

    fn did_resolve(&mut self, _field: &ResponseField, _variables: &Variables) -> Result<()> {
        let (Some(name), Some(value)) = (self.names.pop(), self.values.pop()) else {
            return Err(CacheError::InvalidData(
                "field resolved without a value".to_string(),
            ));
        };
        let object = self
            .objects
            .last_mut()
            .ok_or_else(|| CacheError::InvalidData("field outside any object".to_string()))?;
        object.insert(name, value);
        Ok(())
    }

    fn did_resolve_scalar(&mut self, value: &Value) {
        self.values.push(value.clone());
    }

    fn did_resolve_null(&mut self) {
        self.values.push(Value::Null);
    }

    fn will_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        self.objects.push(Map::new());
        Ok(())
    }

    fn did_resolve_object(&mut self, _field: &ResponseField, _object: &R) -> Result<()> {
        let object = self
            .objects
            .pop()
            .ok_or_else(|| CacheError::InvalidData("object end without start".to_string()))?;
        self.values.push(Value::Object(object));
        Ok(())
    }

    fn did_resolve_list(&mut self, len: usize) {
        let start = self.values.len().saturating_sub(len);
        let items = self.values.split_off(start);
        self.values.push(Value::Array(items));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::EventLog;
    use crate::scalar::FnAdapter;
    use gql_runtime_types::{Condition, QUERY_ROOT_KEY};
    use serde_json::json;

    fn hero() -> ResponseField {
        ResponseField::object(
            "hero",
            vec![
                ResponseField::string("name"),
                ResponseField::list("appearsIn", FieldType::Enum),
            ],
        )
    }

    #[test]
    fn test_writer_replays_reader_event_vocabulary() {
        let adapters = ScalarAdapters::new();
        let name = ResponseField::string("name");
        let appears = ResponseField::list("appearsIn", FieldType::Enum);

        let mut writer = ResponseWriter::new(&adapters);
        writer
            .write_object(&hero(), |w| {
                w.write_string(&name, Some("R2-D2"))?;
                w.write_list(&appears, |items| {
                    items.write_string(Some("JEDI"));
                    Ok(())
                })
            })
            .unwrap();

        let mut log = EventLog::default();
        writer
            .resolve(QUERY_ROOT_KEY, &Variables::new(), &mut log)
            .unwrap();
        assert_eq!(
            log.events,
            vec![
                "root QUERY_ROOT",
                "will hero",
                "{",
                "will name",
                "scalar \"R2-D2\"",
                "did name",
                "will appearsIn",
                "[0",
                "scalar \"JEDI\"",
                "0]",
                "list 1",
                "did appearsIn",
                "}",
                "did hero",
            ]
        );
    }

    #[test]
    fn test_required_null_write_is_rejected() {
        let adapters = ScalarAdapters::new();
        let mut writer = ResponseWriter::new(&adapters);
        let err = writer
            .write_string(&ResponseField::string("name"), None)
            .unwrap_err();
        assert!(matches!(err, CacheError::CorruptedData { .. }));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_marshaller_and_emitter_round_trip() {
        let adapters = ScalarAdapters::new();
        let vars = Variables::new();
        let selections = vec![hero().nullable()];
        let data = json!({"hero": {"name": "R2-D2", "appearsIn": ["NEWHOPE", "JEDI"]}});

        let mut writer = ResponseWriter::new(&adapters);
        JsonMarshaller::new(&vars)
            .marshal(&mut writer, &selections, data.as_object().unwrap())
            .unwrap();
        let mut emitter = JsonEmitter::new();
        writer.resolve(QUERY_ROOT_KEY, &vars, &mut emitter).unwrap();

        assert_eq!(Value::Object(emitter.finish().unwrap()), data);
        assert_eq!(Value::Object(writer.to_json()), data);
    }

    #[test]
    fn test_marshaller_skips_excluded_fields() {
        let adapters = ScalarAdapters::new();
        let vars = Variables::new().with("withName", false);
        let selections = vec![
            ResponseField::id("id"),
            ResponseField::string("name").condition(Condition::include("withName")),
        ];
        let data = json!({"id": "2001", "name": "R2-D2"});

        let mut writer = ResponseWriter::new(&adapters);
        JsonMarshaller::new(&vars)
            .marshal(&mut writer, &selections, data.as_object().unwrap())
            .unwrap();
        assert_eq!(Value::Object(writer.to_json()), json!({"id": "2001"}));
    }

    #[test]
    fn test_custom_scalars_are_encoded() {
        let adapters = ScalarAdapters::new().with(
            "Cents",
            FnAdapter::new(
                |raw| Ok(json!(raw.as_f64().unwrap_or_default() / 100.0)),
                |value| Ok(json!((value.as_f64().unwrap_or_default() * 100.0).round() as i64)),
            ),
        );
        let vars = Variables::new();
        let selections = vec![
            ResponseField::custom("price", "Cents"),
            ResponseField::list("history", FieldType::CustomScalar("Cents".into())),
        ];
        let data = json!({"price": 1.5, "history": [0.25, 1.0]});

        let mut writer = ResponseWriter::new(&adapters);
        JsonMarshaller::new(&vars)
            .marshal(&mut writer, &selections, data.as_object().unwrap())
            .unwrap();
        assert_eq!(
            Value::Object(writer.to_json()),
            json!({"price": 150, "history": [25, 100]})
        );
    }

    #[test]
    fn test_marshaller_rejects_wrong_shape() {
        let adapters = ScalarAdapters::new();
        let vars = Variables::new();
        let mut writer = ResponseWriter::new(&adapters);
        let err = JsonMarshaller::new(&vars)
            .marshal(
                &mut writer,
                &[ResponseField::int("stars")],
                json!({"stars": "five"}).as_object().unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }
}
