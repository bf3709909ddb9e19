//! Responses delivered to callers.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GraphQL error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// One entry of a payload's `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
    /// Field names and list indices leading to the failing value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// One emission of a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// `None` on a cache miss, or when the server returned only errors.
    pub data: Option<Map<String, Value>>,
    pub errors: Vec<GraphQLError>,
    pub from_cache: bool,
    /// Records the data was read from or normalized into.
    pub dependent_keys: BTreeSet<String>,
}

impl Response {
    pub(crate) fn cached(data: Map<String, Value>, dependent_keys: BTreeSet<String>) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            from_cache: true,
            dependent_keys,
        }
    }

    pub(crate) fn cache_miss() -> Self {
        Self {
            data: None,
            errors: Vec::new(),
            from_cache: true,
            dependent_keys: BTreeSet::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Deserialize the data into a caller type.
    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.data
            .as_ref()
            .map(|data| serde_json::from_value(Value::Object(data.clone())))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct HeroData {
        hero: Hero,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Hero {
        name: String,
    }

    #[test]
    fn test_data_as_typed() {
        let data = json!({"hero": {"name": "R2-D2"}});
        let response = Response::cached(
            data.as_object().cloned().unwrap(),
            BTreeSet::from(["QUERY_ROOT".to_string()]),
        );
        let typed: HeroData = response.data_as().unwrap().unwrap();
        assert_eq!(typed.hero.name, "R2-D2");
    }

    #[test]
    fn test_cache_miss_has_no_data() {
        let response = Response::cache_miss();
        assert!(!response.has_data());
        assert!(response.from_cache);
        assert_eq!(response.data_as::<HeroData>().unwrap(), None);
    }

    #[test]
    fn test_error_entry_deserializes_with_defaults() {
        let err: GraphQLError = serde_json::from_value(json!({
            "message": "Name for character with ID 1002 could not be fetched.",
            "path": ["hero", "heroFriends", 1, "name"]
        }))
        .unwrap();
        assert!(err.locations.is_empty());
        assert_eq!(err.path[2], json!(1));
    }
}
