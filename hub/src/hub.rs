use crate::error::Error;
use crate::subscription::Subscription;
use crate::Medium;
use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, Sender};

/// Default per-topic buffer. Subscribers further behind than this lose messages.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Largest per-topic buffer a hub allocates. Larger requests are clamped.
pub const MAX_CAPACITY: usize = 1 << 20;

/// In-process broadcast medium: one bounded broadcast channel per topic.
///
/// Topics are created lazily on first subscription and dropped again once
/// their last subscriber unsubscribes, so publishing to a topic nobody listens
/// on costs a single map lookup.
pub struct Hub {
    topics: DashMap<String, Sender<Arc<str>>>,
    capacity: usize,
    available: AtomicBool,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        // broadcast::channel panics on a zero or oversized capacity
        let clamped = capacity.clamp(1, MAX_CAPACITY);
        if clamped != capacity {
            warn!("Broadcast capacity {capacity} is out of range, using {clamped}");
        }

        Self {
            topics: DashMap::new(),
            capacity: clamped,
            available: AtomicBool::new(true),
        }
    }

    /// Take the medium down. Open subscriptions observe `Poll::Closed`, and
    /// every later publish or subscribe fails with `Unavailable`.
    pub fn shutdown(&self) {
        self.available.store(false, Ordering::SeqCst);
        self.topics.clear();
        info!("Broadcast hub shut down");
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics that currently have a channel.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Medium for Hub {
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, Error> {
        if !self.is_available() {
            return Err(Error::unavailable());
        }

        let delivered = match self.topics.get(topic) {
            // send() only fails when there are no receivers, that's fine.
            Some(sender) => sender.send(Arc::from(payload)).unwrap_or(0),
            None => 0,
        };

        trace!("Published to {topic} ({delivered} subscriber(s))");
        Ok(delivered)
    }

    fn subscribe(&self, topic: &str) -> Result<Subscription, Error> {
        if !self.is_available() {
            return Err(Error::unavailable());
        }

        let receiver = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let subscription = Subscription::new(topic, receiver);
        debug!(
            "Opened subscription {} on {topic}",
            subscription.id().as_str()
        );
        Ok(subscription)
    }

    fn unsubscribe(&self, subscription: Subscription) {
        let topic = subscription.topic().to_string();
        debug!(
            "Releasing subscription {} on {topic}",
            subscription.id().as_str()
        );
        drop(subscription);

        // Clean up topics without subscribers
        self.topics
            .remove_if(&topic, |_, sender| sender.receiver_count() == 0);
    }
}
