//! Operations and payloads modelled on the Star Wars example schema.

use gql_runtime::{FieldType, Operation, ResponseField, Variables};
use gql_runtime::types::ArgumentValue;
use serde_json::{json, Value};

/// `query HeroName($episode: Episode) { hero(episode: $episode) { name } }`
pub fn hero_name(episode: &str) -> Operation {
    Operation::query(
        "HeroName",
        "query HeroName($episode: Episode) { hero(episode: $episode) { name } }",
        vec![ResponseField::object("hero", vec![ResponseField::string("name")])
            .nullable()
            .argument("episode", ArgumentValue::variable("episode"))],
    )
    .with_variables(Variables::new().with("episode", episode))
}

pub fn hero_name_payload(name: &str) -> Value {
    json!({"data": {"hero": {"name": name}}})
}

/// Hero with identified friends, so the id resolver shares records.
pub fn hero_and_friends() -> Operation {
    Operation::query(
        "HeroAndFriends",
        "query HeroAndFriends { hero { id name friends { id name } } }",
        vec![ResponseField::object(
            "hero",
            vec![
                ResponseField::id("id"),
                ResponseField::string("name"),
                ResponseField::list(
                    "friends",
                    FieldType::Object(vec![ResponseField::id("id"), ResponseField::string("name")]),
                ),
            ],
        )
        .nullable()],
    )
}

pub fn hero_and_friends_payload() -> Value {
    json!({"data": {"hero": {
        "id": "2001",
        "name": "R2-D2",
        "friends": [
            {"id": "1000", "name": "Luke Skywalker"},
            {"id": "1002", "name": "Han Solo"},
            {"id": "1003", "name": "Leia Organa"}
        ]
    }}})
}

/// `query Human($id: ID!) { human(id: $id) { id name } }`
pub fn human_by_id(id: &str) -> Operation {
    Operation::query(
        "Human",
        "query Human($id: ID!) { human(id: $id) { id name } }",
        vec![ResponseField::object(
            "human",
            vec![ResponseField::id("id"), ResponseField::string("name")],
        )
        .nullable()
        .argument("id", ArgumentValue::variable("id"))],
    )
    .with_variables(Variables::new().with("id", id))
}
