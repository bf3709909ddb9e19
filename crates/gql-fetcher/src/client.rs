//! The client facade: one store, one transport, calls built per operation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use futures::StreamExt;
use gql_normalized_cache::{CacheStore, ScalarAdapters};
use gql_runtime_types::{Operation, OperationKind};
use gql_transport::{HttpTransport, NetworkTransport};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::executor::{Executor, Sink};
use crate::policy::FetchPolicy;
use crate::response::Response;
use crate::watcher::QueryWatcher;

/// Emissions of one call, in order.
pub type ResponseStream = ReceiverStream<Result<Response>>;

/// At most two emissions per call; anything larger only hides backpressure bugs.
const CALL_BUFFER: usize = 2;

#[derive(Clone)]
pub struct GraphQLClient {
    executor: Executor,
    default_policy: FetchPolicy,
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("store", &self.executor.store)
            .field("default_policy", &self.default_policy)
            .finish()
    }
}

impl GraphQLClient {
    pub fn builder() -> GraphQLClientBuilder {
        GraphQLClientBuilder::default()
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.executor.store
    }

    pub fn default_policy(&self) -> FetchPolicy {
        self.default_policy
    }

    /// Prepare a query call under the client's default policy.
    pub fn query(&self, operation: Operation) -> QueryCall {
        QueryCall {
            executor: self.executor.clone(),
            operation,
            policy: self.default_policy,
        }
    }

    /// Send a mutation. Mutations always go to the network and their
    /// payload is normalized under the mutation root.
    pub async fn mutate(&self, operation: &Operation) -> Result<Response> {
        if operation.kind != OperationKind::Mutation {
            debug!(operation = %operation.name, kind = ?operation.kind, "mutate called with non-mutation operation");
        }
        self.executor.fetch_network(operation).await
    }
}

/// One pending query. Consumed by [`enqueue`](Self::enqueue),
/// [`execute`](Self::execute), or [`watch`](Self::watch).
pub struct QueryCall {
    executor: Executor,
    operation: Operation,
    policy: FetchPolicy,
}

impl QueryCall {
    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Start the call in the background. Must be called within a tokio runtime.
    pub fn enqueue(self) -> ResponseStream {
        let (tx, rx) = mpsc::channel(CALL_BUFFER);
        let QueryCall {
            executor,
            operation,
            policy,
        } = self;
        tokio::spawn(async move {
            let sink = Sink::new(tx, Arc::new(AtomicBool::new(false)));
            executor.run(&operation, policy, &sink).await;
        });
        ReceiverStream::new(rx)
    }

    /// Run the call and collect every emission. The first error wins.
    pub async fn execute(self) -> Result<Vec<Response>> {
        let mut stream = self.enqueue();
        let mut responses = Vec::new();
        while let Some(item) = stream.next().await {
            responses.push(item?);
        }
        if responses.is_empty() {
            return Err(ClientError::Cancelled);
        }
        Ok(responses)
    }

    /// Run the call, then keep emitting as the cached data changes.
    pub fn watch(self) -> QueryWatcher {
        QueryWatcher::spawn(self.executor, self.operation, self.policy)
    }
}

#[derive(Default)]
pub struct GraphQLClientBuilder {
    transport: Option<Arc<dyn NetworkTransport>>,
    store: Option<Arc<CacheStore>>,
    adapters: Option<ScalarAdapters>,
    fetch_policy: Option<FetchPolicy>,
    config: Option<ClientConfig>,
}

impl GraphQLClientBuilder {
    pub fn transport(self, transport: impl NetworkTransport + 'static) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    pub fn shared_transport(mut self, transport: Arc<dyn NetworkTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an existing store. Takes precedence over the config's eviction policy.
    pub fn store(mut self, store: Arc<CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Scalar adapters for a store built by the client. Ignored when a store is given.
    pub fn adapters(mut self, adapters: ScalarAdapters) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(policy);
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> GraphQLClient {
        let config = self.config.unwrap_or_default();
        let transport = self.transport.unwrap_or_else(|| {
            info!(endpoint = %config.endpoint, "using HTTP transport");
            Arc::new(
                HttpTransport::with_timeouts(
                    &config.endpoint,
                    config.request_timeout,
                    config.connect_timeout,
                )
                .with_retry(config.retry),
            )
        });
        let store = self.store.unwrap_or_else(|| {
            let mut builder = CacheStore::builder().eviction(config.eviction);
            if let Some(adapters) = self.adapters {
                builder = builder.adapters(adapters);
            }
            Arc::new(builder.build())
        });
        GraphQLClient {
            executor: Executor { store, transport },
            default_policy: self.fetch_policy.unwrap_or(config.fetch_policy),
        }
    }
}
