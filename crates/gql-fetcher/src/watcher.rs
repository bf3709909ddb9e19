//! Live queries over the normalized cache.
//!
//! A watcher runs its call once under the chosen policy, then re-reads the
//! cache whenever a published change touches a record the last result was
//! built from.

use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use gql_normalized_cache::{CacheStore, SubscriptionId};
use gql_runtime_types::Operation;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::Result;
use crate::executor::{Executor, Sink};
use crate::policy::FetchPolicy;
use crate::response::Response;

const WATCH_BUFFER: usize = 16;

struct WatchState {
    cancelled: Arc<AtomicBool>,
    subscription: Mutex<Option<SubscriptionId>>,
    store: Arc<CacheStore>,
}

/// Cancels a watcher from anywhere. Cloneable; cancelling twice is a no-op.
#[derive(Clone)]
pub struct WatchHandle {
    state: Arc<WatchState>,
}

impl WatchHandle {
    /// Stop the watcher. No read-and-emit starts after this returns.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = self.state.subscription.lock().take() {
            self.state.store.unsubscribe(id);
        }
        debug!("watch cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Stream of a watched query's emissions. Dropping it cancels the watch.
pub struct QueryWatcher {
    stream: ReceiverStream<Result<Response>>,
    handle: WatchHandle,
}

impl QueryWatcher {
    pub(crate) fn spawn(executor: Executor, operation: Operation, policy: FetchPolicy) -> Self {
        let state = Arc::new(WatchState {
            cancelled: Arc::new(AtomicBool::new(false)),
            subscription: Mutex::new(None),
            store: executor.store.clone(),
        });
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let handle = WatchHandle {
            state: state.clone(),
        };
        tokio::spawn(watch_loop(executor, operation, policy, state, tx));
        Self {
            stream: ReceiverStream::new(rx),
            handle,
        }
    }

    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl Stream for QueryWatcher {
    type Item = Result<Response>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

impl Drop for QueryWatcher {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

async fn watch_loop(
    executor: Executor,
    operation: Operation,
    policy: FetchPolicy,
    state: Arc<WatchState>,
    tx: mpsc::Sender<Result<Response>>,
) {
    let sink = Sink::new(tx, state.cancelled.clone());
    // Subscribe first so no write after the initial emission can slip past.
    let mut changes = {
        let mut subscription = state.subscription.lock();
        if state.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let (id, rx) = state.store.subscribe();
        *subscription = Some(id);
        rx
    };

    let last = executor.run(&operation, policy, &sink).await;
    // Without an initial result, watch the root so data written later still shows up.
    let (mut keys, mut last_data) = match last {
        Some(response) => (response.dependent_keys, response.data),
        None => (BTreeSet::from([operation.root_key().to_string()]), None),
    };
    debug!(operation = %operation.name, keys = keys.len(), "watching cache");

    while let Some(change) = changes.recv().await {
        let mut relevant = change.touches(&keys);
        while let Ok(more) = changes.try_recv() {
            relevant |= more.touches(&keys);
        }
        if !sink.is_open() {
            break;
        }
        if !relevant {
            continue;
        }

        match executor.read_cache(&operation) {
            Ok(Some(response)) => {
                keys = response.dependent_keys.clone();
                // The initial call's own merge, or a write of identical values
                // under a new key, re-reads the same data.
                if response.data == last_data {
                    continue;
                }
                last_data = response.data.clone();
                if !sink.emit(Ok(response)).await {
                    break;
                }
            }
            Ok(None) => {
                debug!(operation = %operation.name, "watched data no longer complete in cache");
            }
            Err(e) => {
                if !sink.emit(Err(e)).await {
                    break;
                }
            }
        }
    }

    if let Some(id) = state.subscription.lock().take() {
        state.store.unsubscribe(id);
    }
    debug!(operation = %operation.name, "watch ended");
}
