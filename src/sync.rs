//! Broadcast hub for the shared clipboard value.
//!
//! The hub holds exactly one value (the latest accepted text) and a registry
//! of live push subscribers. It is not a durable log: a new subscriber is
//! caught up with the current value and then receives every later update in
//! publish order, so memory stays O(1) for content and O(subscribers) for
//! the registry regardless of update volume.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

/// Size of the per-subscriber delivery buffer.
///
/// A reader that falls this many updates behind is treated as gone and
/// removed, so a publisher is never blocked by a stalled connection.
const SUBSCRIBER_BUFFER_SIZE: usize = 64;

/// Hub managing the shared text value and all live push subscribers.
pub struct SyncHub {
    inner: Arc<Mutex<HubInner>>,
}

struct HubInner {
    /// Latest accepted text. Replaced whole on every publish.
    content: String,
    /// Next subscriber id to hand out.
    next_id: u64,
    /// Subscriber id -> delivery channel.
    subscribers: HashMap<u64, mpsc::Sender<String>>,
}

fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncHub {
    /// Create a hub with empty content and no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                content: String::new(),
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Register a new subscriber.
    ///
    /// The current content is queued as the subscriber's first message before
    /// the registry lock is released, so the catch-up message and any
    /// concurrent publish are observed in a single total order.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER_SIZE);

        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;

        // Fresh channel, the buffer cannot be full.
        let _ = tx.try_send(inner.content.clone());
        inner.subscribers.insert(id, tx);
        debug!(
            "subscriber {} registered ({} total)",
            id,
            inner.subscribers.len()
        );

        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Replace the shared value and fan it out to every live subscriber.
    ///
    /// Delivery is non-blocking; a subscriber whose channel is closed or whose
    /// buffer is full is removed as a side effect and never surfaces an error
    /// to the publisher. The registry lock is held across the fan-out (all
    /// sends are `try_send`, no await points), which serializes concurrent
    /// publishes and guarantees each subscriber sees updates in publish order.
    pub fn publish(&self, new_content: String) {
        let mut inner = lock(&self.inner);
        inner.content = new_content;

        let mut dead = Vec::new();
        for (id, tx) in &inner.subscribers {
            if tx.try_send(inner.content.clone()).is_err() {
                dead.push(*id);
            }
        }

        for id in dead {
            inner.subscribers.remove(&id);
            debug!("subscriber {} dropped during delivery", id);
        }
    }

    /// Remove a subscriber from the registry. Idempotent.
    pub fn unsubscribe(&self, id: u64) {
        if lock(&self.inner).subscribers.remove(&id).is_some() {
            debug!("subscriber {} unregistered", id);
        }
    }

    /// The latest accepted content.
    pub fn current(&self) -> String {
        lock(&self.inner).content.clone()
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One live push connection.
///
/// Receives the catch-up message and every subsequent update. Dropping the
/// subscription unregisters it, so a client disconnect prunes the registry as
/// soon as the transport releases the response stream rather than waiting for
/// the next failed delivery.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<String>,
    registry: Arc<Mutex<HubInner>>,
}

impl Subscription {
    /// Receive the next update. Returns `None` once removed from the hub.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if lock(&self.registry).subscribers.remove(&self.id).is_some() {
            debug!("subscriber {} disconnected", self.id);
        }
    }
}
