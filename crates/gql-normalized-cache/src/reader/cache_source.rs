use std::collections::BTreeSet;
use std::sync::Arc;

use gql_runtime_types::{FieldType, ResponseField, Variables};
use tracing::trace;

use super::{SourceValue, ValueSource};
use crate::cache_key::CacheKeyResolver;
use crate::error::{CacheError, Result};
use crate::field_key::field_key;
use crate::record::{Record, RecordValue};
use crate::store::RecordStore;

/// Reads fields out of stored records, following references through the
/// store. Every record loaded is added to the dependent-key set.
///
/// A field the record never stored, or a reference whose target is gone
/// (evicted or removed), is a cache miss error rather than `null`.
pub struct CacheSource<'a> {
    store: &'a dyn RecordStore,
    resolver: &'a dyn CacheKeyResolver,
    dependent_keys: BTreeSet<String>,
}

impl<'a> CacheSource<'a> {
    pub fn new(store: &'a dyn RecordStore, resolver: &'a dyn CacheKeyResolver) -> Self {
        Self {
            store,
            resolver,
            dependent_keys: BTreeSet::new(),
        }
    }

    /// Load the record a read starts from.
    pub fn root(&mut self, key: &str) -> Result<Arc<Record>> {
        self.load(key)
    }

    pub fn dependent_keys(&self) -> &BTreeSet<String> {
        &self.dependent_keys
    }

    pub fn into_dependent_keys(self) -> BTreeSet<String> {
        self.dependent_keys
    }

    fn load(&mut self, key: &str) -> Result<Arc<Record>> {
        match self.store.load_record(key) {
            Some(record) => {
                self.dependent_keys.insert(key.to_string());
                Ok(record)
            }
            None => {
                trace!(key = key, "record not cached");
                Err(CacheError::MissingRecord(key.to_string()))
            }
        }
    }

    fn convert(
        &mut self,
        value: &RecordValue,
        field_type: &FieldType,
    ) -> Result<SourceValue<Arc<Record>>> {
        Ok(match value {
            RecordValue::Null => SourceValue::Null,
            RecordValue::Reference(reference) => SourceValue::Object(self.load(reference.key())?),
            RecordValue::List(items) => {
                let element = match field_type {
                    FieldType::List(element) => element.as_ref(),
                    other => other,
                };
                let mut converted = Vec::with_capacity(items.len());
                for item in items {
                    converted.push(self.convert(item, element)?);
                }
                SourceValue::List(converted)
            }
            scalar => SourceValue::Scalar(scalar.as_scalar().unwrap_or_default()),
        })
    }
}

impl ValueSource for CacheSource<'_> {
    type Object = Arc<Record>;

    fn field_value(
        &mut self,
        record: &Self::Object,
        field: &ResponseField,
        variables: &Variables,
    ) -> Result<Option<SourceValue<Self::Object>>> {
        if field.field_type.is_object() {
            if let Some(key) = self.resolver.from_field_arguments(field, variables) {
                let target = self.load(key.as_str())?;
                return Ok(Some(SourceValue::Object(target)));
            }
        }

        let key = field_key(field, variables)?;
        let value = record.field(&key).ok_or_else(|| CacheError::MissingField {
            key: record.key().to_string(),
            field: key.clone(),
        })?;
        self.convert(value, &field.field_type).map(Some)
    }

    fn type_name(&self, record: &Self::Object) -> Option<String> {
        record
            .field("__typename")
            .and_then(RecordValue::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key::{IdFieldResolver, NoIdentityResolver};
    use crate::delegate::NoOpDelegate;
    use crate::reader::ResponseReader;
    use crate::record::CacheReference;
    use crate::record_set::RecordSet;
    use crate::scalar::ScalarAdapters;
    use crate::store::{EvictionPolicy, MemoryRecordStore};
    use gql_runtime_types::{ArgumentValue, QUERY_ROOT_KEY};
    use serde_json::json;

    fn seeded_store() -> MemoryRecordStore {
        let store = MemoryRecordStore::new(EvictionPolicy::NO_EVICTION);
        let records: RecordSet = vec![
            Record::builder(QUERY_ROOT_KEY)
                .field("hero", CacheReference::new("2001"))
                .build(),
            Record::builder("2001")
                .field("name", "R2-D2")
                .field(
                    "friends",
                    vec![CacheReference::new("1000"), CacheReference::new("1002")],
                )
                .build(),
            Record::builder("1000").field("name", "Luke Skywalker").build(),
            Record::builder("1002").field("name", "Han Solo").build(),
        ]
        .into_iter()
        .collect();
        store.merge_all(records);
        store
    }

    fn hero_with_friends() -> Vec<ResponseField> {
        vec![ResponseField::object(
            "hero",
            vec![
                ResponseField::string("name"),
                ResponseField::list(
                    "friends",
                    FieldType::Object(vec![ResponseField::string("name")]),
                ),
            ],
        )]
    }

    #[test]
    fn test_reads_through_references_and_tracks_dependents() {
        let store = seeded_store();
        let vars = Variables::new();
        let adapters = ScalarAdapters::new();
        let mut source = CacheSource::new(&store, &NoIdentityResolver);
        let root = source.root(QUERY_ROOT_KEY).unwrap();

        let mut reader = ResponseReader::new(source, &vars, &adapters);
        let data = reader
            .read(QUERY_ROOT_KEY, &root, &hero_with_friends(), &mut NoOpDelegate)
            .unwrap();

        assert_eq!(
            serde_json::Value::Object(data),
            json!({"hero": {"name": "R2-D2", "friends": [
                {"name": "Luke Skywalker"}, {"name": "Han Solo"}
            ]}})
        );
        let deps = reader.into_source().into_dependent_keys();
        assert_eq!(
            deps,
            BTreeSet::from(
                ["QUERY_ROOT", "2001", "1000", "1002"].map(String::from)
            )
        );
    }

    #[test]
    fn test_dangling_reference_is_a_miss() {
        let store = seeded_store();
        store.remove("1002", false);
        let vars = Variables::new();
        let adapters = ScalarAdapters::new();
        let mut source = CacheSource::new(&store, &NoIdentityResolver);
        let root = source.root(QUERY_ROOT_KEY).unwrap();

        let err = ResponseReader::new(source, &vars, &adapters)
            .read(QUERY_ROOT_KEY, &root, &hero_with_friends(), &mut NoOpDelegate)
            .unwrap_err();
        assert!(err.is_cache_miss());
        assert!(matches!(err, CacheError::MissingRecord(k) if k == "1002"));
    }

    #[test]
    fn test_unstored_field_is_a_miss() {
        let store = seeded_store();
        let vars = Variables::new();
        let adapters = ScalarAdapters::new();
        let mut source = CacheSource::new(&store, &NoIdentityResolver);
        let root = source.root(QUERY_ROOT_KEY).unwrap();
        let selections = vec![ResponseField::object(
            "hero",
            vec![ResponseField::string("primaryFunction").nullable()],
        )];

        let err = ResponseReader::new(source, &vars, &adapters)
            .read(QUERY_ROOT_KEY, &root, &selections, &mut NoOpDelegate)
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::MissingField { ref key, ref field } if key == "2001" && field == "primaryFunction"
        ));
    }

    #[test]
    fn test_argument_shortcut_skips_root_reference() {
        let store = seeded_store();
        let resolver = IdFieldResolver::new().with_id_argument("id");
        let vars = Variables::new().with("id", "1000");
        let adapters = ScalarAdapters::new();
        let mut source = CacheSource::new(&store, &resolver);
        let root = source.root(QUERY_ROOT_KEY).unwrap();
        let selections = vec![ResponseField::object(
            "character",
            vec![ResponseField::string("name")],
        )
        .argument("id", ArgumentValue::variable("id"))];

        let data = ResponseReader::new(source, &vars, &adapters)
            .read(QUERY_ROOT_KEY, &root, &selections, &mut NoOpDelegate)
            .unwrap();
        assert_eq!(data["character"], json!({"name": "Luke Skywalker"}));
    }
}
