use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};

/// Unique identifier for a subscription (generated by the hub)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one bounded-wait poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// The next raw payload for this subscription.
    Message(Arc<str>),
    /// Nothing arrived within the wait, or the subscriber lagged and the
    /// skipped payloads are lost.
    Empty,
    /// The medium dropped the topic; no further payloads will arrive.
    Closed,
}

/// A live subscription to one topic. Exclusively owned by the task that
/// opened it; released through `Medium::unsubscribe` or by dropping it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    receiver: Receiver<Arc<str>>,
}

impl Subscription {
    pub(crate) fn new(topic: &str, receiver: Receiver<Arc<str>>) -> Self {
        Self {
            id: SubscriptionId::new(),
            topic: topic.to_string(),
            receiver,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait at most `wait` for the next payload.
    ///
    /// Cancel-safe: dropping the returned future loses no payload, so it can be
    /// raced against socket reads in a `select!`.
    pub async fn poll(&mut self, wait: Duration) -> Poll {
        match tokio::time::timeout(wait, self.receiver.recv()).await {
            Err(_elapsed) => Poll::Empty,
            Ok(Ok(payload)) => Poll::Message(payload),
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(
                    "Subscription {} on {} fell behind, {skipped} message(s) lost",
                    self.id.as_str(),
                    self.topic
                );
                Poll::Empty
            }
            Ok(Err(RecvError::Closed)) => Poll::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    #[tokio::test]
    async fn poll_returns_published_payload() {
        let (sender, receiver) = broadcast::channel(4);
        let mut subscription = Subscription::new("root", receiver);

        sender.send(Arc::from("model:{}")).unwrap();

        assert_eq!(
            subscription.poll(Duration::from_millis(50)).await,
            Poll::Message(Arc::from("model:{}"))
        );
        assert_eq!(subscription.topic(), "root");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_when_idle() {
        let (_sender, receiver) = broadcast::channel::<Arc<str>>(4);
        let mut subscription = Subscription::new("root", receiver);

        assert_eq!(subscription.poll(Duration::from_secs(1)).await, Poll::Empty);
    }

    #[tokio::test]
    async fn poll_reports_closed_when_sender_is_gone() {
        let (sender, receiver) = broadcast::channel::<Arc<str>>(4);
        let mut subscription = Subscription::new("root", receiver);
        drop(sender);

        assert_eq!(
            subscription.poll(Duration::from_millis(50)).await,
            Poll::Closed
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_loses_oldest_payloads() {
        let (sender, receiver) = broadcast::channel(2);
        let mut subscription = Subscription::new("root", receiver);

        for i in 0..4 {
            sender.send(Arc::from(format!("base:{i}"))).unwrap();
        }

        // The first poll observes the lag; the next ones see what is left.
        assert_eq!(subscription.poll(Duration::from_millis(50)).await, Poll::Empty);
        assert_eq!(
            subscription.poll(Duration::from_millis(50)).await,
            Poll::Message(Arc::from("base:2"))
        );
        assert_eq!(
            subscription.poll(Duration::from_millis(50)).await,
            Poll::Message(Arc::from("base:3"))
        );
    }

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
