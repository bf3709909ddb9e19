//! HTTP transport over a blocking `ureq` agent.
//!
//! Each request runs on tokio's blocking pool so the async caller never
//! stalls a runtime worker. Transport failures, `429`, and `5xx` responses
//! are retried with exponential backoff; other statuses fail immediately.

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use gql_runtime_types::{env_var_or, RetryConfig};
use tracing::{debug, warn};

use crate::endpoint::{is_local_endpoint, resolve_endpoint};
use crate::{GraphQLRequest, NetworkTransport};

/// Upper bound on a response body we are willing to buffer.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpTransport {
    endpoint: String,
    agent: ureq::Agent,
    retry: RetryConfig,
    headers: Vec<(String, String)>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .field("headers", &self.headers.len())
            .finish()
    }
}

impl HttpTransport {
    /// Default request timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    pub fn default_timeouts() -> (Duration, Duration) {
        let timeout_secs = env_var_or("GQL_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS);
        let connect_secs =
            env_var_or("GQL_CONNECT_TIMEOUT_SECS", Self::DEFAULT_CONNECT_TIMEOUT_SECS);
        (
            Duration::from_secs(timeout_secs),
            Duration::from_secs(connect_secs),
        )
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    /// Create a transport for `endpoint` with env-configured timeouts.
    pub fn new(endpoint: &str) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self::with_timeouts(endpoint, timeout, connect_timeout)
    }

    /// Create a transport for whatever [`resolve_endpoint`] picks.
    pub fn from_env() -> Self {
        Self::new(&resolve_endpoint(None))
    }

    /// Create a transport with explicit timeouts.
    pub fn with_timeouts(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: Self::build_agent(timeout, connect_timeout),
            retry: RetryConfig::default(),
            headers: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add a header sent with every request (e.g. `Authorization`).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send one request synchronously, retrying per the retry config.
    pub fn post_blocking(&self, request: &GraphQLRequest) -> Result<Vec<u8>> {
        let body = serde_json::to_string(request).context("Failed to encode GraphQL request")?;
        let mut attempt = 0;
        loop {
            match self.post_once(&body) {
                Ok(bytes) => {
                    debug!(
                        endpoint = %self.endpoint,
                        bytes = bytes.len(),
                        attempt,
                        "GraphQL response received"
                    );
                    return Ok(bytes);
                }
                Err(PostError::Fatal(e)) => return Err(e),
                Err(PostError::Retryable(e)) if attempt < self.retry.retries => {
                    attempt += 1;
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        endpoint = %self.endpoint,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "GraphQL request failed, retrying"
                    );
                    std::thread::sleep(backoff);
                }
                Err(PostError::Retryable(e)) => {
                    return Err(e.context(format!(
                        "GraphQL request to {} failed after {} attempt(s)",
                        self.endpoint,
                        attempt + 1
                    )))
                }
            }
        }
    }

    fn post_once(&self, body: &str) -> std::result::Result<Vec<u8>, PostError> {
        let mut call = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        for (name, value) in &self.headers {
            call = call.set(name, value);
        }

        match call.send_string(body) {
            Ok(response) => read_body(response).map_err(PostError::Fatal),
            Err(ureq::Error::Status(code, response)) => {
                let detail = read_body(response)
                    .map(|b| String::from_utf8_lossy(&b).chars().take(256).collect::<String>())
                    .unwrap_or_default();
                let err = anyhow!("GraphQL server returned HTTP {}: {}", code, detail);
                if code == 429 || code >= 500 {
                    Err(PostError::Retryable(err))
                } else {
                    Err(PostError::Fatal(err))
                }
            }
            Err(ureq::Error::Transport(t)) => Err(PostError::Retryable(anyhow!(
                "GraphQL request failed: {}",
                t
            ))),
        }
    }
}

enum PostError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>> {
    read_limited(response.into_reader(), MAX_BODY_BYTES)
}

/// Buffer at most `limit` bytes; a longer body is an error, never a prefix.
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .context("Failed to read GraphQL response body")?;
    if bytes.len() as u64 > limit {
        return Err(anyhow!("GraphQL response body exceeds {} bytes", limit));
    }
    Ok(bytes)
}

#[async_trait]
impl NetworkTransport for HttpTransport {
    async fn fetch(&self, request: &GraphQLRequest) -> Result<Vec<u8>> {
        if !is_local_endpoint(&self.endpoint) {
            debug!(endpoint = %self.endpoint, operation = ?request.operation_name, "sending GraphQL request");
        }
        let transport = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || transport.post_blocking(&request))
            .await
            .map_err(|e| anyhow!("GraphQL request task failed: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("https://custom.endpoint/graphql");
        assert_eq!(transport.endpoint(), "https://custom.endpoint/graphql");
        assert_eq!(transport.retry(), &RetryConfig::default());

        let quiet = transport
            .with_retry(RetryConfig::none())
            .with_header("Authorization", "Bearer token");
        assert_eq!(quiet.retry().retries, 0);
        assert_eq!(quiet.headers.len(), 1);
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let body = br#"{"data":{"hero":{"name":"R2-D2"}}}"#;
        let limit = body.len() as u64;

        let exact = read_limited(&body[..], limit).unwrap();
        assert_eq!(exact, body.to_vec());

        let err = read_limited(&body[..], limit - 1).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_retries() {
        // Port 9 (discard) on loopback is reliably closed in CI sandboxes.
        let transport = HttpTransport::with_timeouts(
            "http://127.0.0.1:9/graphql",
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .with_retry(RetryConfig::new(1, 1, 1));

        let err = transport
            .fetch(&GraphQLRequest::new("{ hero { name } }"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 2 attempt(s)"), "{err:#}");
    }
}
