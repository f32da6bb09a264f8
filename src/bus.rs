//! Topic-based event dispatcher
//!
//! Decouples adapters (producers) from business logic (consumers). The
//! topic is derived from the payload's logical kind, not its value; publish
//! is fire-and-forget with at-most-once delivery per subscriber, ordered
//! within a topic, with every subscriber invocation isolated from the
//! others. Subscriptions are disposable registration handles: dropping the
//! handle unregisters, so the registry cannot leak over adapter restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A payload type with a fixed logical topic
pub trait BusEvent: Serialize + DeserializeOwned + Send + 'static {
    /// Topic this event kind is routed on
    const TOPIC: &'static str;
}

/// Per-subscriber dispatch failure; logged, never propagated
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Payload could not be decoded into the subscriber's event type
    #[error("Payload decode failed: {0}")]
    Decode(String),

    /// Subscriber handler reported a failure
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Subscriber queue was full or gone; event dropped for this subscriber
    #[error("Subscriber lagged, event dropped")]
    Lagged,
}

type RawHandler = Arc<dyn Fn(&[u8]) -> Result<(), DispatchError> + Send + Sync>;

struct SubscriberEntry {
    id: u64,
    handler: RawHandler,
}

/// Subscription registry; read-mostly, snapshotted at publish time
struct Registry {
    topics: RwLock<HashMap<String, Vec<SubscriberEntry>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.topics.write();
        if let Some(entries) = topics.get_mut(topic) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// Registration handle; dropping it unsubscribes
pub struct Subscription {
    registry: Weak<Registry>,
    topic: String,
    id: u64,
}

impl Subscription {
    /// Topic this subscription is registered on
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.topic, self.id);
        }
    }
}

/// In-process publish/subscribe bus
///
/// Cheap to clone; all clones share one registry for the process lifetime.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Registry>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Publish a typed event on its topic
    ///
    /// Serializes once and hands the payload to every currently registered
    /// subscriber in subscription order. No subscribers is a no-op.
    pub fn publish<E: BusEvent>(&self, event: &E) {
        match serde_json::to_vec(event) {
            Ok(payload) => self.publish_raw(E::TOPIC, &payload),
            Err(error) => {
                tracing::error!(topic = E::TOPIC, %error, "event serialization failed, not published");
            }
        }
    }

    /// Publish a pre-serialized payload on an explicit topic
    pub fn publish_raw(&self, topic: &str, payload: &[u8]) {
        // Snapshot under the read lock, invoke outside it so subscribe
        // calls are never blocked by running handlers
        let handlers: Vec<(u64, RawHandler)> = {
            let topics = self.inner.topics.read();
            match topics.get(topic) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (entry.id, entry.handler.clone()))
                    .collect(),
                None => return,
            }
        };

        for (id, handler) in handlers {
            if let Err(error) = handler(payload) {
                tracing::warn!(topic, subscriber = id, %error, "subscriber dispatch failed");
            }
        }
    }

    /// Register a raw handler on an explicit topic
    pub fn subscribe_raw(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(&[u8]) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Subscription {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .write()
            .entry(topic.clone())
            .or_default()
            .push(SubscriberEntry {
                id,
                handler: Arc::new(handler),
            });
        Subscription {
            registry: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// Register a typed handler on the event's topic
    pub fn subscribe<E: BusEvent>(
        &self,
        handler: impl Fn(E) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_raw(E::TOPIC, move |payload| {
            let event: E = serde_json::from_slice(payload)
                .map_err(|e| DispatchError::Decode(e.to_string()))?;
            handler(event)
        })
    }

    /// Register a bounded channel consumer on the event's topic
    ///
    /// Fan-out never blocks the publisher: when the consumer falls behind
    /// and the queue is full, the event is dropped for that consumer.
    pub fn subscribe_channel<E: BusEvent>(
        &self,
        capacity: usize,
    ) -> (Subscription, flume::Receiver<E>) {
        let (tx, rx) = flume::bounded(capacity);
        let subscription = self.subscribe::<E>(move |event| match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(_)) => Err(DispatchError::Lagged),
            Err(flume::TrySendError::Disconnected(_)) => {
                Err(DispatchError::Handler("receiver dropped".to_string()))
            }
        });
        (subscription, rx)
    }

    /// Number of subscribers currently registered on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map_or(0, |entries| entries.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.inner.topics.read().len())
            .finish()
    }
}
