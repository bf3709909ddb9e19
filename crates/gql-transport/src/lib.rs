//! GraphQL Transport Layer
//!
//! Moves composed GraphQL requests to a server and hands back the raw
//! response bytes. Nothing here looks inside the payload beyond what is
//! needed to log it; parsing and normalization belong to the fetch layer.
//!
//! This crate provides:
//! - [`NetworkTransport`]: the `fetch(request) -> bytes` contract
//! - [`http`]: blocking `ureq` transport driven from the async runtime
//! - [`replay`]: queued canned payloads, for tests and offline runs
//! - [`endpoint`]: endpoint resolution with environment overrides
//!
//! # Example
//!
//! ```ignore
//! use gql_transport::{GraphQLRequest, HttpTransport, NetworkTransport};
//!
//! let transport = HttpTransport::new("https://swapi.example.com/graphql");
//! let bytes = transport.fetch(&GraphQLRequest::from_operation(&operation)).await?;
//! ```

pub mod endpoint;
pub mod http;
pub mod replay;

pub use endpoint::{resolve_endpoint, DEFAULT_ENDPOINT, ENDPOINT_ENV};
pub use http::HttpTransport;
pub use replay::ReplayTransport;

use async_trait::async_trait;
use gql_runtime_types::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body sent to a GraphQL server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Value,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Value::Object(Default::default()),
        }
    }

    /// Compose the wire request for an operation. The document is forwarded as is.
    pub fn from_operation(operation: &Operation) -> Self {
        Self {
            query: operation.document.clone(),
            operation_name: (!operation.name.is_empty()).then(|| operation.name.clone()),
            variables: operation.variables.to_value(),
        }
    }
}

/// A network collaborator: given a request, return the raw JSON bytes or an error.
///
/// Timeouts and retries are the transport's business; callers only see the
/// final outcome.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    async fn fetch(&self, request: &GraphQLRequest) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
impl<T: NetworkTransport + ?Sized> NetworkTransport for std::sync::Arc<T> {
    async fn fetch(&self, request: &GraphQLRequest) -> anyhow::Result<Vec<u8>> {
        (**self).fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gql_runtime_types::{ResponseField, Variables};
    use serde_json::json;

    #[test]
    fn test_request_from_operation() {
        let op = Operation::query(
            "HeroName",
            "query HeroName($episode: Episode) { hero(episode: $episode) { name } }",
            vec![ResponseField::string("name")],
        )
        .with_variables(Variables::new().with("episode", "JEDI"));

        let request = GraphQLRequest::from_operation(&op);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "query": "query HeroName($episode: Episode) { hero(episode: $episode) { name } }",
                "operationName": "HeroName",
                "variables": {"episode": "JEDI"}
            })
        );
    }

    #[test]
    fn test_anonymous_request_omits_operation_name() {
        let request = GraphQLRequest::new("{ hero { name } }");
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("operationName").is_none());
        assert_eq!(body["variables"], json!({}));
    }
}
