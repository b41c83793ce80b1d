// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-keyed event fan-out with bounded per-subscriber buffers.
//!
//! Publishing never blocks: a subscriber whose channel is full loses the
//! message and its drop counter advances. Cancelling a subscription
//! detaches it from the topic; messages already buffered stay readable
//! until the consumer drops the receiver.

use crate::error::EngineError;
use jl_core::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The single logical topic carrying all job events.
pub const TOPIC_JOBS: &str = "jobs";

/// Default per-subscriber channel capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

struct SubscriberHandle {
    id: u64,
    tx: mpsc::Sender<Event>,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

struct BusInner {
    topics: RwLock<HashMap<String, Vec<SubscriberHandle>>>,
    closed: RwLock<bool>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Multi-subscriber event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                closed: RwLock::new(false),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Deliver an event to every live subscriber of `topic`.
    ///
    /// Non-blocking; full channels drop the event for that subscriber only.
    pub fn publish(&self, topic: &str, event: Event) -> Result<(), EngineError> {
        if *self.inner.closed.read() {
            return Err(EngineError::InvalidState("event bus is closed".to_string()));
        }

        let mut stale = false;
        {
            let topics = self.inner.topics.read();
            let Some(subscribers) = topics.get(topic) else {
                return Ok(());
            };
            for sub in subscribers {
                if sub.token.is_cancelled() {
                    stale = true;
                    continue;
                }
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        sub.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        stale = true;
                    }
                }
            }
        }

        if stale {
            let mut topics = self.inner.topics.write();
            if let Some(subscribers) = topics.get_mut(topic) {
                subscribers.retain(|s| !s.token.is_cancelled() && !s.tx.is_closed());
            }
        }
        Ok(())
    }

    /// Register a new subscriber on `topic`.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let token = CancellationToken::new();
        let dropped = Arc::new(AtomicU64::new(0));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        if *self.inner.closed.read() {
            // Closed bus hands out an already-cancelled, empty subscription.
            token.cancel();
        } else {
            self.inner.topics.write().entry(topic.to_string()).or_default().push(
                SubscriberHandle {
                    id,
                    tx,
                    token: token.clone(),
                    dropped: Arc::clone(&dropped),
                },
            );
        }

        Subscription { id, topic: topic.to_string(), rx, token, dropped }
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.token.is_cancelled()).count())
            .unwrap_or(0)
    }

    /// Cancel every subscription and refuse further publishes.
    pub fn close(&self) {
        *self.inner.closed.write() = true;
        let mut topics = self.inner.topics.write();
        for subscribers in topics.values() {
            for sub in subscribers {
                sub.token.cancel();
            }
        }
        topics.clear();
    }

    /// Detach one subscription by id (used by the manager when tearing
    /// down a job's streams).
    pub(crate) fn detach(&self, topic: &str, id: u64) {
        let mut topics = self.inner.topics.write();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|s| {
                if s.id == id {
                    s.token.cancel();
                    false
                } else {
                    true
                }
            });
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// One subscriber's end of a topic.
pub struct Subscription {
    id: u64,
    topic: String,
    rx: mpsc::Receiver<Event>,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next event.
    ///
    /// After cancellation, already-buffered events keep draining; `None`
    /// means the subscription is finished.
    pub async fn recv(&mut self) -> Option<Event> {
        if let Ok(event) = self.rx.try_recv() {
            return Some(event);
        }
        if self.token.is_cancelled() {
            return self.rx.try_recv().ok();
        }
        tokio::select! {
            event = self.rx.recv() => event,
            _ = self.token.cancelled() => self.rx.try_recv().ok(),
        }
    }

    /// Detach from the topic. Publishes after this are no-ops for this
    /// subscription.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancellation handle, for wiring into select loops.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Events lost to a full buffer. Monotonic.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
