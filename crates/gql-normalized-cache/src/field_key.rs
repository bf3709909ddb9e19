//! Field-key codec.
//!
//! Encodes a field name plus its resolved arguments into the string a record
//! stores the value under:
//!
//! - `name` when the field has no arguments (or every argument was an absent
//!   optional variable)
//! - `hero(episode:JEDI)` / `reviews(first:10,stars:{min:4})` otherwise
//!
//! Arguments are sorted by name, object entries by key, and variable
//! references are substituted before encoding, so different argument values
//! produce different keys and declaration order never matters.

use gql_runtime_types::{ResponseField, Variables};
use serde_json::Value;

use crate::error::Result;

/// Compute the cache field key for `field` under `variables`.
///
/// Fails with [`CacheError::Variable`](crate::CacheError::Variable) when a
/// required variable is absent.
pub fn field_key(field: &ResponseField, variables: &Variables) -> Result<String> {
    let mut resolved = Vec::with_capacity(field.arguments.len());
    // BTreeMap iteration is already sorted by argument name.
    for (name, argument) in &field.arguments {
        if let Some(value) = argument.resolve(variables)? {
            resolved.push((name.as_str(), value));
        }
    }

    if resolved.is_empty() {
        return Ok(field.name.clone());
    }

    let mut key = String::with_capacity(field.name.len() + 16);
    key.push_str(&field.name);
    key.push('(');
    for (i, (name, value)) in resolved.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(name);
        key.push(':');
        encode_value(value, &mut key);
    }
    key.push(')');
    Ok(key)
}

fn encode_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(k);
                out.push(':');
                encode_value(v, out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use gql_runtime_types::{ArgumentValue, FieldType};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn hero() -> ResponseField {
        ResponseField::new("hero", FieldType::Object(vec![]))
    }

    #[test]
    fn test_no_arguments_is_plain_name() {
        let key = field_key(&ResponseField::string("name"), &Variables::new()).unwrap();
        assert_eq!(key, "name");
    }

    #[test]
    fn test_alias_does_not_affect_key() {
        let field = ResponseField::string("name").alias("heroName");
        assert_eq!(field_key(&field, &Variables::new()).unwrap(), "name");
    }

    #[test]
    fn test_variable_is_substituted() {
        let field = hero().argument("episode", ArgumentValue::variable("episode"));
        let vars = Variables::new().with("episode", "JEDI");
        assert_eq!(field_key(&field, &vars).unwrap(), "hero(episode:JEDI)");
    }

    #[test]
    fn test_arguments_sorted_regardless_of_declaration_order() {
        let a = hero().argument("stars", 4).argument("episode", "EMPIRE");
        let b = hero().argument("episode", "EMPIRE").argument("stars", 4);
        let vars = Variables::new();
        assert_eq!(field_key(&a, &vars).unwrap(), "hero(episode:EMPIRE,stars:4)");
        assert_eq!(field_key(&a, &vars).unwrap(), field_key(&b, &vars).unwrap());
    }

    #[test]
    fn test_nested_objects_sorted_and_variables_resolved() {
        let review = ArgumentValue::Object(BTreeMap::from([
            ("stars".to_string(), ArgumentValue::variable("stars")),
            ("commentary".to_string(), ArgumentValue::from("Great")),
            (
                "favoriteColor".to_string(),
                ArgumentValue::Literal(json!({"red": 0, "blue": 255, "green": 0})),
            ),
        ]));
        let field = ResponseField::new("createReview", FieldType::Object(vec![]))
            .argument("review", review)
            .argument("episode", "JEDI");
        let vars = Variables::new().with("stars", 5);

        assert_eq!(
            field_key(&field, &vars).unwrap(),
            "createReview(episode:JEDI,review:{commentary:Great,favoriteColor:{blue:255,green:0,red:0},stars:5})"
        );
    }

    #[test]
    fn test_absent_optional_argument_is_excluded() {
        let field = hero()
            .argument("episode", ArgumentValue::optional_variable("episode"))
            .argument("first", 3);
        assert_eq!(
            field_key(&field, &Variables::new()).unwrap(),
            "hero(first:3)"
        );

        let only_optional = hero().argument("episode", ArgumentValue::optional_variable("episode"));
        assert_eq!(field_key(&only_optional, &Variables::new()).unwrap(), "hero");
    }

    #[test]
    fn test_explicit_null_is_encoded() {
        let field = hero().argument("episode", ArgumentValue::optional_variable("episode"));
        let vars = Variables::new().with("episode", Value::Null);
        assert_eq!(field_key(&field, &vars).unwrap(), "hero(episode:null)");
    }

    #[test]
    fn test_missing_required_variable_fails_fast() {
        let field = hero().argument("episode", ArgumentValue::variable("episode"));
        let err = field_key(&field, &Variables::new()).unwrap_err();
        assert!(matches!(err, CacheError::Variable(_)));
    }

    #[test]
    fn test_list_arguments() {
        let field = ResponseField::new("search", FieldType::Object(vec![]))
            .argument("ids", ArgumentValue::Literal(json!(["1000", "1002"])));
        assert_eq!(
            field_key(&field, &Variables::new()).unwrap(),
            "search(ids:[1000,1002])"
        );
    }
}
