//! Fetch-policy and watch behavior against a replayed transport.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gql_fetcher::{ClientError, FetchPolicy, GraphQLClient, Response};
use gql_normalized_cache::{CacheStore, IdFieldResolver};
use gql_runtime_types::{FieldType, Operation, ResponseField};
use gql_transport::ReplayTransport;
use serde_json::{json, Value};

fn hero_name() -> Operation {
    Operation::query(
        "HeroName",
        "query HeroName { hero { name } }",
        vec![ResponseField::object("hero", vec![ResponseField::string("name")]).nullable()],
    )
}

fn hero_with_friends() -> Operation {
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
        )],
    )
}

fn client_with(transport: &Arc<ReplayTransport>, policy: FetchPolicy) -> GraphQLClient {
    GraphQLClient::builder()
        .shared_transport(transport.clone())
        .fetch_policy(policy)
        .build()
}

fn hero_name_of(response: &Response) -> Option<&str> {
    response.data.as_ref()?.get("hero")?.get("name")?.as_str()
}

async fn next_within(
    watcher: &mut (impl futures::Stream<Item = gql_fetcher::Result<Response>> + Unpin),
    wait: Duration,
) -> Option<gql_fetcher::Result<Response>> {
    tokio::time::timeout(wait, watcher.next()).await.ok().flatten()
}

#[tokio::test]
async fn test_cache_first_serves_second_call_from_cache() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    let client = client_with(&transport, FetchPolicy::CacheFirst);

    let first = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].from_cache);
    assert_eq!(hero_name_of(&first[0]), Some("R2-D2"));

    let second = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(second.len(), 1);
    assert!(second[0].from_cache);
    assert_eq!(hero_name_of(&second[0]), Some("R2-D2"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_cache_only_miss_is_not_an_error() {
    let transport = Arc::new(ReplayTransport::new());
    let client = client_with(&transport, FetchPolicy::CacheOnly);

    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].from_cache);
    assert!(!responses[0].has_data());
    assert_eq!(transport.request_count(), 0);
    assert_eq!(client.store().metrics().snapshot().misses, 1);
}

/// Stores `{"hero": {"name": null}}`, which `hero_name()` cannot read back
/// because its `name` is required.
fn store_null_hero_name(client: &GraphQLClient) {
    let nullable_name = Operation::query(
        "HeroNameNullable",
        "query HeroNameNullable { hero { name } }",
        vec![
            ResponseField::object("hero", vec![ResponseField::string("name").nullable()])
                .nullable(),
        ],
    );
    client
        .store()
        .write_operation(&nullable_name, json!({"hero": {"name": null}}).as_object().unwrap())
        .unwrap();
}

#[tokio::test]
async fn test_cache_first_fetches_when_cached_data_is_incomplete() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    let client = client_with(&transport, FetchPolicy::CacheFirst);
    store_null_hero_name(&client);

    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].from_cache);
    assert_eq!(hero_name_of(&responses[0]), Some("R2-D2"));
    assert_eq!(transport.request_count(), 1);

    let again = client.query(hero_name()).execute().await.unwrap();
    assert!(again[0].from_cache);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_cache_only_incomplete_data_is_a_miss() {
    let transport = Arc::new(ReplayTransport::new());
    let client = client_with(&transport, FetchPolicy::CacheOnly);
    store_null_hero_name(&client);

    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].from_cache);
    assert!(!responses[0].has_data());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_network_only_ignores_cache() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    transport.enqueue_json(&json!({"data": {"hero": {"name": "Artoo"}}}));
    let client = client_with(&transport, FetchPolicy::NetworkOnly);

    client.query(hero_name()).execute().await.unwrap();
    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].from_cache);
    assert_eq!(hero_name_of(&responses[0]), Some("Artoo"));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(client.store().metrics().snapshot().network_fetches, 2);
}

#[tokio::test]
async fn test_network_first_falls_back_to_cache() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    transport.enqueue_error("connection refused");
    let client = client_with(&transport, FetchPolicy::NetworkFirst);

    client.query(hero_name()).execute().await.unwrap();
    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].from_cache);
    assert_eq!(hero_name_of(&responses[0]), Some("R2-D2"));
}

#[tokio::test]
async fn test_network_first_surfaces_network_error_on_cache_miss() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_error("connection refused");
    let client = client_with(&transport, FetchPolicy::NetworkFirst);

    let err = client.query(hero_name()).execute().await.unwrap_err();
    assert!(err.is_network(), "{err}");
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_cache_and_network_emits_cache_then_network() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    transport.enqueue_json(&json!({"data": {"hero": {"name": "Artoo"}}}));
    let client = client_with(&transport, FetchPolicy::CacheAndNetwork);

    // Empty cache: exactly one emission, no placeholder.
    let first = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].from_cache);

    let second = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second[0].from_cache);
    assert_eq!(hero_name_of(&second[0]), Some("R2-D2"));
    assert!(!second[1].from_cache);
    assert_eq!(hero_name_of(&second[1]), Some("Artoo"));
}

#[tokio::test]
async fn test_cache_and_network_keeps_cache_result_when_fetch_fails() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    transport.enqueue_error("timeout");
    let client = client_with(&transport, FetchPolicy::CacheAndNetwork);

    client.query(hero_name()).execute().await.unwrap();
    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].from_cache);
}

#[tokio::test]
async fn test_malformed_payload_is_not_merged() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {
        "id": "2001", "name": "R2-D2", "friends": [{"id": "1000", "name": null}]
    }}}));
    let store = Arc::new(CacheStore::builder().resolver(IdFieldResolver::new()).build());
    let client = GraphQLClient::builder()
        .shared_transport(transport.clone())
        .store(store.clone())
        .fetch_policy(FetchPolicy::NetworkOnly)
        .build();

    let err = client.query(hero_with_friends()).execute().await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedPayload(_)), "{err}");
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced_with_data() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({
        "data": {"hero": null},
        "errors": [{"message": "hero is unavailable", "path": ["hero"]}]
    }));
    let client = client_with(&transport, FetchPolicy::NetworkOnly);

    let responses = client.query(hero_name()).execute().await.unwrap();
    assert_eq!(responses[0].errors.len(), 1);
    assert_eq!(responses[0].errors[0].message, "hero is unavailable");
    assert_eq!(
        responses[0].data.as_ref().map(|d| d["hero"].clone()),
        Some(Value::Null)
    );
}

#[tokio::test]
async fn test_non_json_payload_is_malformed() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_bytes(b"<html>502 Bad Gateway</html>".to_vec());
    let client = client_with(&transport, FetchPolicy::NetworkOnly);

    let err = client.query(hero_name()).execute().await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedPayload(_)));
}

#[tokio::test]
async fn test_mutation_normalizes_under_mutation_root() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"createReview": {"stars": 5}}}));
    let client = client_with(&transport, FetchPolicy::CacheFirst);
    let mutation = Operation::mutation(
        "CreateReview",
        "mutation CreateReview { createReview(episode: JEDI) { stars } }",
        vec![ResponseField::object("createReview", vec![ResponseField::int("stars")])
            .argument("episode", "JEDI")],
    );

    let response = client.mutate(&mutation).await.unwrap();
    assert!(!response.from_cache);
    assert!(client.store().load_record("MUTATION_ROOT").is_some());
    assert!(client
        .store()
        .load_record("MUTATION_ROOT.createReview(episode:JEDI)")
        .is_some());
    assert_eq!(transport.requests()[0].operation_name.as_deref(), Some("CreateReview"));
}

#[tokio::test]
async fn test_watch_emits_once_per_relevant_change() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    let client = client_with(&transport, FetchPolicy::CacheFirst);

    let mut watcher = client.query(hero_name()).watch();
    let initial = next_within(&mut watcher, Duration::from_secs(1))
        .await
        .expect("initial emission")
        .unwrap();
    assert_eq!(hero_name_of(&initial), Some("R2-D2"));
    assert!(initial.dependent_keys.contains("hero"));

    // Unrelated write: no emission.
    client
        .store()
        .write_operation(
            &Operation::query("Other", "", vec![ResponseField::string("motd")]),
            json!({"motd": "hello"}).as_object().unwrap(),
        )
        .unwrap();

    client
        .store()
        .write_operation(
            &hero_name(),
            json!({"hero": {"name": "Artoo"}}).as_object().unwrap(),
        )
        .unwrap();

    let update = next_within(&mut watcher, Duration::from_secs(1))
        .await
        .expect("update emission")
        .unwrap();
    assert!(update.from_cache);
    assert_eq!(hero_name_of(&update), Some("Artoo"));
    assert!(next_within(&mut watcher, Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn test_cancelled_watch_never_emits_again() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    let client = client_with(&transport, FetchPolicy::CacheFirst);

    let mut watcher = client.query(hero_name()).watch();
    next_within(&mut watcher, Duration::from_secs(1))
        .await
        .expect("initial emission")
        .unwrap();

    let handle = watcher.handle();
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());

    client
        .store()
        .write_operation(
            &hero_name(),
            json!({"hero": {"name": "Artoo"}}).as_object().unwrap(),
        )
        .unwrap();

    assert!(next_within(&mut watcher, Duration::from_millis(200)).await.is_none());
    assert_eq!(client.store().subscriber_count(), 0);
}

#[tokio::test]
async fn test_cache_only_watch_picks_up_later_write() {
    let transport = Arc::new(ReplayTransport::new());
    let client = client_with(&transport, FetchPolicy::CacheOnly);

    let mut watcher = client.query(hero_name()).watch();
    let miss = next_within(&mut watcher, Duration::from_secs(1))
        .await
        .expect("miss emission")
        .unwrap();
    assert!(!miss.has_data());

    client
        .store()
        .write_operation(
            &hero_name(),
            json!({"hero": {"name": "R2-D2"}}).as_object().unwrap(),
        )
        .unwrap();

    let update = next_within(&mut watcher, Duration::from_secs(1))
        .await
        .expect("update emission")
        .unwrap();
    assert_eq!(hero_name_of(&update), Some("R2-D2"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_enqueue_streams_in_order() {
    let transport = Arc::new(ReplayTransport::new());
    transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
    transport.enqueue_json(&json!({"data": {"hero": {"name": "Artoo"}}}));
    let client = client_with(&transport, FetchPolicy::CacheAndNetwork);
    client.query(hero_name()).execute().await.unwrap();

    let sources: Vec<bool> = client
        .query(hero_name())
        .enqueue()
        .map(|item| item.unwrap().from_cache)
        .collect()
        .await;
    assert_eq!(sources, vec![true, false]);
}
