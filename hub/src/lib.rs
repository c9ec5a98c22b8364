//! Broadcast medium for relaying raw wire messages to connection handlers.
//!
//! This crate provides the process-wide publish/subscribe channel the gateway
//! reads from. Producers publish UTF-8 text payloads under a topic string; every
//! current subscriber of that exact topic receives a copy.
//!
//! # Delivery semantics
//!
//! - **At-most-once**: a payload published while nobody is subscribed to its
//!   topic is gone. There is no backlog for late subscribers.
//! - **Loss over queueing**: every topic has a bounded buffer. A subscriber that
//!   falls further behind than the buffer skips the oldest payloads instead of
//!   holding them up for everybody else.
//! - **Per-subscription ordering only**: one subscription sees payloads in
//!   publish order; nothing is guaranteed across topics.
//! - **Graceful degradation**: once the medium is shut down, `publish` and
//!   `subscribe` return `Unavailable` errors. Callers log and carry on without
//!   live updates.
//!
//! # Modules
//!
//! - `hub`: the in-process [`Hub`], one `tokio::sync::broadcast` channel per topic
//! - `subscription`: [`Subscription`] handle with a bounded-wait `poll`
//! - `error`: error kinds reported by the medium

pub mod error;
pub mod hub;
pub mod subscription;

pub use error::Error;
pub use hub::Hub;
pub use subscription::{Poll, Subscription, SubscriptionId};

/// A publish/subscribe channel keyed by topic string.
///
/// Implementations must be cheap to call from many tasks at once; the gateway
/// shares a single medium between every connection handler.
pub trait Medium: Send + Sync {
    /// Publish `payload` to every current subscriber of `topic`.
    /// Returns the number of subscribers that received it.
    fn publish(&self, topic: &str, payload: &str) -> Result<usize, Error>;

    /// Open a new subscription on `topic`.
    fn subscribe(&self, topic: &str) -> Result<Subscription, Error>;

    /// Release a subscription previously returned by [`Medium::subscribe`].
    fn unsubscribe(&self, subscription: Subscription);
}
