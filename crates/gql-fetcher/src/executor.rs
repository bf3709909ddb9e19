//! Fetch-policy state machine.
//!
//! One call runs to completion inside a single task and pushes its
//! emissions through one channel, so a cache emission always precedes the
//! network emission of the same call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gql_normalized_cache::{CacheError, CacheStore};
use gql_runtime_types::Operation;
use gql_transport::{GraphQLRequest, NetworkTransport};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::policy::FetchPolicy;
use crate::response::{GraphQLError, Response};

/// Where a call's emissions go. Stops accepting once the receiver is gone or
/// the call is cancelled.
pub(crate) struct Sink {
    tx: mpsc::Sender<Result<Response>>,
    cancelled: Arc<AtomicBool>,
}

impl Sink {
    pub(crate) fn new(tx: mpsc::Sender<Result<Response>>, cancelled: Arc<AtomicBool>) -> Self {
        Self { tx, cancelled }
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    /// Returns false when the emission was dropped.
    pub(crate) async fn emit(&self, item: Result<Response>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.tx.send(item).await.is_ok()
    }
}

#[derive(Clone)]
pub(crate) struct Executor {
    pub(crate) store: Arc<CacheStore>,
    pub(crate) transport: Arc<dyn NetworkTransport>,
}

impl Executor {
    /// `Ok(None)` is a miss. Stored values that do not fit the operation's
    /// shape (a null required field, a mistyped scalar) are not a complete
    /// hit either, so they read as a miss.
    pub(crate) fn read_cache(&self, operation: &Operation) -> Result<Option<Response>> {
        match self.store.read_operation(operation) {
            Ok(cached) => Ok(cached.map(|c| Response::cached(c.data, c.dependent_keys))),
            Err(e @ (CacheError::CorruptedData { .. } | CacheError::TypeMismatch { .. })) => {
                debug!(operation = %operation.name, reason = %e, "cached data incomplete");
                self.store.metrics().record_miss();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch, validate, normalize, and merge. Nothing is merged unless the
    /// whole payload normalizes.
    pub(crate) async fn fetch_network(&self, operation: &Operation) -> Result<Response> {
        self.store.metrics().record_network_fetch();
        let request = GraphQLRequest::from_operation(operation);
        let bytes = self
            .transport
            .fetch(&request)
            .await
            .map_err(ClientError::Network)?;

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::MalformedPayload(format!("response is not JSON: {}", e)))?;
        let Value::Object(mut body) = body else {
            return Err(ClientError::MalformedPayload(
                "response is not a JSON object".to_string(),
            ));
        };

        let errors: Vec<GraphQLError> = match body.remove("errors") {
            None | Some(Value::Null) => Vec::new(),
            Some(errors) => serde_json::from_value(errors)
                .map_err(|e| ClientError::MalformedPayload(format!("invalid errors array: {}", e)))?,
        };
        if !errors.is_empty() {
            warn!(
                operation = %operation.name,
                errors = errors.len(),
                first = %errors[0].message,
                "GraphQL errors in response"
            );
        }

        let data = match body.remove("data") {
            Some(Value::Object(data)) => data,
            None | Some(Value::Null) if !errors.is_empty() => {
                return Ok(Response {
                    data: None,
                    errors,
                    from_cache: false,
                    dependent_keys: Default::default(),
                })
            }
            None | Some(Value::Null) => {
                return Err(ClientError::MalformedPayload(
                    "response has neither data nor errors".to_string(),
                ))
            }
            Some(_) => {
                return Err(ClientError::MalformedPayload(
                    "response data is not an object".to_string(),
                ))
            }
        };

        let payload = self
            .store
            .normalize_payload(operation, &data)
            .map_err(ClientError::from_payload)?;
        let dependent_keys = payload.normalized.dependent_keys;
        let changes = self.store.merge_records(payload.normalized.records);
        debug!(
            operation = %operation.name,
            records = dependent_keys.len(),
            changed_fields = changes.len(),
            "merged network response"
        );

        Ok(Response {
            data: Some(payload.data),
            errors,
            from_cache: false,
            dependent_keys,
        })
    }

    /// Run `operation` under `policy`, emitting into `sink`. Returns the last
    /// emitted response that carried data.
    pub(crate) async fn run(
        &self,
        operation: &Operation,
        policy: FetchPolicy,
        sink: &Sink,
    ) -> Option<Response> {
        debug!(operation = %operation.name, policy = %policy, "executing operation");
        let mut last = None;

        match policy {
            FetchPolicy::CacheOnly => {
                let item = self
                    .read_cache(operation)
                    .map(|hit| hit.unwrap_or_else(Response::cache_miss));
                sink.emit(track(&mut last, item)).await;
            }
            FetchPolicy::NetworkOnly => {
                let item = self.fetch_network(operation).await;
                sink.emit(track(&mut last, item)).await;
            }
            FetchPolicy::CacheFirst => match self.read_cache(operation) {
                Ok(Some(hit)) => {
                    sink.emit(track(&mut last, Ok(hit))).await;
                }
                Ok(None) => {
                    debug!(operation = %operation.name, "cache miss, fetching");
                    if sink.is_open() {
                        let item = self.fetch_network(operation).await;
                        sink.emit(track(&mut last, item)).await;
                    }
                }
                Err(e) => {
                    debug!(operation = %operation.name, error = %e, "cache read failed, fetching");
                    if sink.is_open() {
                        let item = self.fetch_network(operation).await;
                        sink.emit(track(&mut last, item)).await;
                    }
                }
            },
            FetchPolicy::NetworkFirst => match self.fetch_network(operation).await {
                Ok(response) => {
                    sink.emit(track(&mut last, Ok(response))).await;
                }
                Err(network_err) => {
                    warn!(operation = %operation.name, error = %network_err, "fetch failed, falling back to cache");
                    let item = match self.read_cache(operation) {
                        Ok(Some(hit)) => Ok(hit),
                        Ok(None) => Err(network_err),
                        Err(cache_err) => {
                            debug!(error = %cache_err, "cache fallback failed");
                            Err(network_err)
                        }
                    };
                    sink.emit(track(&mut last, item)).await;
                }
            },
            FetchPolicy::CacheAndNetwork => {
                let cached = match self.read_cache(operation) {
                    Ok(hit) => hit,
                    Err(e) => {
                        debug!(operation = %operation.name, error = %e, "cache read failed");
                        None
                    }
                };
                let had_cache = cached.is_some();
                if let Some(hit) = cached {
                    if !sink.emit(track(&mut last, Ok(hit))).await {
                        return last;
                    }
                }
                if !sink.is_open() {
                    return last;
                }
                match self.fetch_network(operation).await {
                    Ok(response) => {
                        sink.emit(track(&mut last, Ok(response))).await;
                    }
                    Err(e) if had_cache => {
                        warn!(operation = %operation.name, error = %e, "fetch failed after cache emission");
                    }
                    Err(e) => {
                        sink.emit(track(&mut last, Err(e))).await;
                    }
                }
            }
        }
        last
    }
}

fn track(last: &mut Option<Response>, item: Result<Response>) -> Result<Response> {
    if let Ok(response) = &item {
        if response.has_data() {
            *last = Some(response.clone());
        }
    }
    item
}
