//! A transport that serves queued payloads instead of talking to a server.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::{GraphQLRequest, NetworkTransport};

enum Canned {
    Payload(Vec<u8>),
    Failure(String),
}

/// Serves enqueued responses in FIFO order and records every request it sees.
///
/// Fetching with an empty queue is an error, so a test can assert that a
/// fetch policy never touched the network just by not enqueueing anything.
#[derive(Default)]
pub struct ReplayTransport {
    queue: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<GraphQLRequest>>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_json(&self, payload: &Value) {
        self.enqueue_bytes(payload.to_string().into_bytes());
    }

    pub fn enqueue_bytes(&self, bytes: impl Into<Vec<u8>>) {
        self.queue.lock().push_back(Canned::Payload(bytes.into()));
    }

    pub fn enqueue_error(&self, message: impl Into<String>) {
        self.queue.lock().push_back(Canned::Failure(message.into()));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn requests(&self) -> Vec<GraphQLRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl NetworkTransport for ReplayTransport {
    async fn fetch(&self, request: &GraphQLRequest) -> Result<Vec<u8>> {
        self.requests.lock().push(request.clone());
        let next = self.queue.lock().pop_front();
        debug!(operation = ?request.operation_name, served = next.is_some(), "replay fetch");
        match next {
            Some(Canned::Payload(bytes)) => Ok(bytes),
            Some(Canned::Failure(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no response enqueued")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_in_order_and_records_requests() {
        let transport = ReplayTransport::new();
        transport.enqueue_json(&json!({"data": {"hero": {"name": "R2-D2"}}}));
        transport.enqueue_error("connection reset");

        let request = GraphQLRequest::new("{ hero { name } }");
        let first = transport.fetch(&request).await.unwrap();
        let parsed: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(parsed["data"]["hero"]["name"], "R2-D2");

        let err = transport.fetch(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");

        assert!(transport.fetch(&request).await.is_err());
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.pending(), 0);
    }
}
