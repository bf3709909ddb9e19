//! Flattening response trees into records.
//!
//! [`ResponseNormalizer`] is a [`ResolveDelegate`] over raw JSON objects. It
//! keeps a stack of record builders (one per object being visited), a stack
//! of pending values, and the path of field keys and list indices from the
//! nearest keyed record. Every nested object becomes its own record:
//!
//! - keyed by the resolver's identity when it returns one; the path then
//!   restarts at that key
//! - otherwise keyed by its path, e.g. `hero(episode:JEDI).friends.0`
//!
//! and the parent stores a [`CacheReference`] in its place. Children of the
//! query root use bare paths; any other root (mutation root, fragment target)
//! prefixes paths with its own key so they never collide with query data.

use std::collections::BTreeSet;

use gql_runtime_types::{ResponseField, Variables, QUERY_ROOT_KEY};
use serde_json::{Map, Value};
use tracing::trace;

use crate::cache_key::CacheKeyResolver;
use crate::delegate::ResolveDelegate;
use crate::error::{CacheError, Result};
use crate::field_key::field_key;
use crate::record::{CacheReference, Record, RecordBuilder, RecordValue};
use crate::record_set::RecordSet;

/// Result of normalizing one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    pub records: RecordSet,
    /// Every record key produced, root included.
    pub dependent_keys: BTreeSet<String>,
}

pub struct ResponseNormalizer<'r> {
    resolver: &'r dyn CacheKeyResolver,
    current: Option<RecordBuilder>,
    record_stack: Vec<RecordBuilder>,
    path: Vec<String>,
    path_stack: Vec<Vec<String>>,
    values: Vec<RecordValue>,
    records: RecordSet,
    dependent_keys: BTreeSet<String>,
}

impl<'r> ResponseNormalizer<'r> {
    pub fn new(resolver: &'r dyn CacheKeyResolver) -> Self {
        Self {
            resolver,
            current: None,
            record_stack: Vec::new(),
            path: Vec::new(),
            path_stack: Vec::new(),
            values: Vec::new(),
            records: RecordSet::new(),
            dependent_keys: BTreeSet::new(),
        }
    }

    /// Close the root record and return everything produced.
    pub fn finish(mut self) -> Result<NormalizedResponse> {
        let root = self
            .current
            .take()
            .ok_or_else(|| CacheError::InvalidData("normalization never started".to_string()))?;
        if !self.record_stack.is_empty() || !self.values.is_empty() {
            return Err(CacheError::InvalidData(
                "unbalanced resolve events".to_string(),
            ));
        }
        let root = root.build();
        self.dependent_keys.insert(root.key().to_string());
        self.records.merge(root);
        trace!(
            records = self.records.len(),
            "normalized response"
        );
        Ok(NormalizedResponse {
            records: self.records,
            dependent_keys: self.dependent_keys,
        })
    }

    fn current_mut(&mut self) -> Result<&mut RecordBuilder> {
        self.current
            .as_mut()
            .ok_or_else(|| CacheError::InvalidData("field outside any record".to_string()))
    }

    fn path_key(&self) -> String {
        self.path.join(".")
    }
}

impl ResolveDelegate<Map<String, Value>> for ResponseNormalizer<'_> {
    fn will_resolve_root(&mut self, root_key: &str) {
        self.record_stack.clear();
        self.path_stack.clear();
        self.values.clear();
        self.records = RecordSet::new();
        self.dependent_keys.clear();
        self.path = if root_key == QUERY_ROOT_KEY {
            Vec::new()
        } else {
            vec![root_key.to_string()]
        };
        self.current = Some(Record::builder(root_key));
    }

    fn will_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        self.path.push(field_key(field, variables)?);
        Ok(())
    }

    fn did_resolve(&mut self, field: &ResponseField, variables: &Variables) -> Result<()> {
        self.path.pop();
        let value = self.values.pop().ok_or_else(|| CacheError::InvalidData(format!(
            "field `{}` resolved without a value",
            field.response_name()
        )))?;
        let key = field_key(field, variables)?;
        self.current_mut()?.add_field(key, value);
        Ok(())
    }

    fn did_resolve_scalar(&mut self, value: &Value) {
        self.values.push(RecordValue::from_scalar(value));
    }

    fn did_resolve_null(&mut self) {
        self.values.push(RecordValue::Null);
    }

    fn will_resolve_object(&mut self, field: &ResponseField, object: &Map<String, Value>) -> Result<()> {
        self.path_stack.push(self.path.clone());
        let key = match self.resolver.from_field_record_set(field, object) {
            Some(key) => {
                let key = key.into_string();
                self.path = vec![key.clone()];
                key
            }
            None => self.path_key(),
        };
        let parent = self
            .current
            .replace(Record::builder(key))
            .ok_or_else(|| CacheError::InvalidData("object outside any record".to_string()))?;
        self.record_stack.push(parent);
        Ok(())
    }

    fn did_resolve_object(&mut self, _field: &ResponseField, _object: &Map<String, Value>) -> Result<()> {
        self.path = self
            .path_stack
            .pop()
            .ok_or_else(|| CacheError::InvalidData("object end without start".to_string()))?;
        let parent = self
            .record_stack
            .pop()
            .ok_or_else(|| CacheError::InvalidData("object end without parent".to_string()))?;
        let completed = self
            .current
            .replace(parent)
            .ok_or_else(|| CacheError::InvalidData("object end without record".to_string()))?
            .build();
        let key = completed.key().to_string();
        self.values.push(RecordValue::Reference(CacheReference::new(key.clone())));
        self.dependent_keys.insert(key);
        self.records.merge(completed);
        Ok(())
    }

    fn did_resolve_list(&mut self, len: usize) {
        let start = self.values.len().saturating_sub(len);
        let items = self.values.split_off(start);
        self.values.push(RecordValue::List(items));
    }

    fn will_resolve_element(&mut self, index: usize) {
        self.path.push(index.to_string());
    }

    fn did_resolve_element(&mut self, _index: usize) {
        self.path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key::{IdFieldResolver, NoIdentityResolver};
    use crate::reader::{JsonSource, ResponseReader};
    use crate::scalar::ScalarAdapters;
    use gql_runtime_types::{ArgumentValue, Condition, FieldType, MUTATION_ROOT_KEY};
    use serde_json::json;

    fn normalize(
        root_key: &str,
        selections: &[ResponseField],
        data: Value,
        variables: &Variables,
        resolver: &dyn CacheKeyResolver,
    ) -> NormalizedResponse {
        let adapters = ScalarAdapters::new();
        let data = data.as_object().cloned().unwrap_or_default();
        let mut normalizer = ResponseNormalizer::new(resolver);
        ResponseReader::new(JsonSource, variables, &adapters)
            .read(root_key, &data, selections, &mut normalizer)
            .unwrap();
        normalizer.finish().unwrap()
    }

    fn hero_friends_query() -> Vec<ResponseField> {
        vec![ResponseField::object(
            "hero",
            vec![
                ResponseField::string("name"),
                ResponseField::list(
                    "friends",
                    FieldType::Object(vec![ResponseField::string("name")]),
                ),
            ],
        )
        .argument("episode", ArgumentValue::variable("episode"))]
    }

    #[test]
    fn test_path_keys_for_list_elements() {
        let vars = Variables::new().with("episode", "JEDI");
        let out = normalize(
            QUERY_ROOT_KEY,
            &hero_friends_query(),
            json!({"hero": {"name": "R2-D2", "friends": [
                {"name": "Luke Skywalker"}, {"name": "Han Solo"}
            ]}}),
            &vars,
            &NoIdentityResolver,
        );

        let root = out.records.get(QUERY_ROOT_KEY).unwrap();
        assert_eq!(
            root.field("hero(episode:JEDI)"),
            Some(&RecordValue::Reference(CacheReference::new("hero(episode:JEDI)")))
        );
        let hero = out.records.get("hero(episode:JEDI)").unwrap();
        assert_eq!(
            hero.field("friends"),
            Some(&RecordValue::List(vec![
                CacheReference::new("hero(episode:JEDI).friends.0").into(),
                CacheReference::new("hero(episode:JEDI).friends.1").into(),
            ]))
        );
        assert_eq!(
            out.records
                .get("hero(episode:JEDI).friends.1")
                .and_then(|r| r.field("name"))
                .and_then(RecordValue::as_str),
            Some("Han Solo")
        );
        assert_eq!(out.records.len(), 4);
        assert_eq!(out.dependent_keys.len(), 4);
    }

    #[test]
    fn test_identity_restarts_path() {
        let selections = vec![ResponseField::object(
            "hero",
            vec![
                ResponseField::id("id"),
                ResponseField::object("starship", vec![ResponseField::string("name")]).nullable(),
            ],
        )];
        let out = normalize(
            QUERY_ROOT_KEY,
            &selections,
            json!({"hero": {"id": "1000", "starship": {"name": "X-wing"}}}),
            &Variables::new(),
            &IdFieldResolver::new(),
        );

        assert!(out.records.get("1000").is_some());
        assert!(out.records.get("1000.starship").is_some());
        assert!(out.records.get("hero").is_none());
    }

    #[test]
    fn test_aliases_normalize_independently() {
        let selections = vec![
            ResponseField::object("hero", vec![ResponseField::string("name")])
                .alias("r2")
                .argument("episode", "NEWHOPE"),
            ResponseField::object("hero", vec![ResponseField::string("name")])
                .alias("luke")
                .argument("episode", "EMPIRE"),
        ];
        let out = normalize(
            QUERY_ROOT_KEY,
            &selections,
            json!({"r2": {"name": "R2-D2"}, "luke": {"name": "Luke Skywalker"}}),
            &Variables::new(),
            &NoIdentityResolver,
        );

        let name = |key: &str| {
            out.records
                .get(key)
                .and_then(|r| r.field("name"))
                .and_then(RecordValue::as_str)
                .map(str::to_string)
        };
        assert_eq!(name("hero(episode:NEWHOPE)").as_deref(), Some("R2-D2"));
        assert_eq!(name("hero(episode:EMPIRE)").as_deref(), Some("Luke Skywalker"));
    }

    #[test]
    fn test_duplicate_entity_merges_into_one_record() {
        let friend = FieldType::Object(vec![ResponseField::id("id"), ResponseField::string("name")]);
        let selections = vec![ResponseField::object(
            "hero",
            vec![
                ResponseField::id("id"),
                ResponseField::list("friends", friend.clone()),
                ResponseField::new("bestFriend", friend),
            ],
        )];
        let out = normalize(
            QUERY_ROOT_KEY,
            &selections,
            json!({"hero": {
                "id": "2001",
                "friends": [{"id": "1000", "name": "Luke Skywalker"}],
                "bestFriend": {"id": "1000", "name": "Luke Skywalker"}
            }}),
            &Variables::new(),
            &IdFieldResolver::new(),
        );
        assert_eq!(out.records.len(), 3);
        assert_eq!(
            out.records.get("2001").and_then(|r| r.field("bestFriend")),
            Some(&RecordValue::Reference(CacheReference::new("1000")))
        );
    }

    #[test]
    fn test_skipped_field_is_absent_not_null() {
        let selections = vec![
            ResponseField::string("name"),
            ResponseField::string("secret")
                .nullable()
                .condition(Condition::skip("hide")),
        ];
        let out = normalize(
            QUERY_ROOT_KEY,
            &selections,
            json!({"name": "R2-D2"}),
            &Variables::new().with("hide", true),
            &NoIdentityResolver,
        );
        let root = out.records.get(QUERY_ROOT_KEY).unwrap();
        assert!(root.has_field("name"));
        assert!(!root.has_field("secret"));
    }

    #[test]
    fn test_non_query_root_prefixes_paths() {
        let selections = vec![ResponseField::object(
            "createReview",
            vec![ResponseField::int("stars")],
        )
        .argument("episode", "JEDI")];
        let out = normalize(
            MUTATION_ROOT_KEY,
            &selections,
            json!({"createReview": {"stars": 5}}),
            &Variables::new(),
            &NoIdentityResolver,
        );
        assert!(out
            .records
            .get("MUTATION_ROOT.createReview(episode:JEDI)")
            .is_some());
    }

    #[test]
    fn test_nested_lists_and_nulls() {
        let selections = vec![ResponseField::list(
            "grid",
            FieldType::list_of(FieldType::Object(vec![ResponseField::int("v")])),
        )
        .nullable()];
        let out = normalize(
            QUERY_ROOT_KEY,
            &selections,
            json!({"grid": [[{"v": 1}, null], [{"v": 2}]]}),
            &Variables::new(),
            &NoIdentityResolver,
        );
        let root = out.records.get(QUERY_ROOT_KEY).unwrap();
        assert_eq!(
            root.field("grid"),
            Some(&RecordValue::List(vec![
                RecordValue::List(vec![
                    CacheReference::new("grid.0.0").into(),
                    RecordValue::Null,
                ]),
                RecordValue::List(vec![CacheReference::new("grid.1.0").into()]),
            ]))
        );
    }
}
