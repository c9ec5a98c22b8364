use crate::envelope::{validate_identifier, WireEnvelope};
use crate::error::Error;
use crate::topic::Topic;
use async_trait::async_trait;
use domain::Identity;
use hub::Medium;
use log::*;
use serde_json::Value;

/// Result of decoding a wire body (or envelope).
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<P> {
    Decoded(P),
    /// The input cannot be turned into a payload; the message is dropped.
    Malformed(String),
}

/// Result of the authorize step for one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// The client-facing payload to send.
    Authorized(Value),
    /// Withheld from this connection only.
    Vetoed(String),
}

/// What the relay loop should do with one raw broadcast message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Deliver(Value),
    Malformed(String),
    Vetoed(String),
}

impl From<Authorization> for Outcome {
    fn from(authorization: Authorization) -> Self {
        match authorization {
            Authorization::Authorized(payload) => Outcome::Deliver(payload),
            Authorization::Vetoed(reason) => Outcome::Vetoed(reason),
        }
    }
}

/// A kind of event that can travel over the broadcast medium.
///
/// The delivery side runs `decode`, then `authorize` and `prepare` once per
/// connection. Implementations must not keep per-connection state: the same
/// instance serves every connection concurrently.
#[async_trait]
pub trait MessageType: Send + Sync + 'static {
    type Payload: Send + Sync;

    fn identifier(&self) -> &str;

    /// Turn a JSON body into this type's payload. May perform I/O (for example
    /// re-resolving an entity).
    async fn decode(&self, body: &str) -> Decoded<Self::Payload>;

    /// Whether `identity` may see this payload.
    fn authorize(&self, _payload: &Self::Payload, _identity: &Identity) -> bool {
        true
    }

    /// Build the client-facing representation.
    fn prepare(&self, payload: Self::Payload, identity: &Identity) -> Value;

    fn authorize_and_prepare(&self, payload: Self::Payload, identity: &Identity) -> Authorization {
        if !self.authorize(&payload, identity) {
            return Authorization::Vetoed(format!(
                "Ignoring {} message, not authorized for {}",
                self.identifier(),
                identity.label()
            ));
        }
        Authorization::Authorized(self.prepare(payload, identity))
    }
}

/// Type-erased delivery pipeline stored in the [`crate::Registry`].
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, body: &str, identity: &Identity) -> Outcome;
}

#[async_trait]
impl<T: MessageType> Relay for T {
    async fn relay(&self, body: &str, identity: &Identity) -> Outcome {
        match self.decode(body).await {
            Decoded::Decoded(payload) => self.authorize_and_prepare(payload, identity).into(),
            Decoded::Malformed(reason) => Outcome::Malformed(reason),
        }
    }
}

/// Publish-side value object: an identifier, the topics to publish on and the
/// JSON data making up the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    identifier: String,
    topics: Vec<Topic>,
    data: Value,
}

impl Message {
    pub fn new(
        identifier: impl Into<String>,
        topics: Vec<Topic>,
        data: Value,
    ) -> Result<Self, Error> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self {
            identifier,
            topics,
            data,
        })
    }

    pub(crate) fn with_known_identifier(identifier: &str, topics: Vec<Topic>, data: Value) -> Self {
        Self {
            identifier: identifier.to_string(),
            topics,
            data,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn body(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.data)?)
    }

    pub fn to_wire(&self) -> Result<String, Error> {
        let body = self.body()?;
        Ok(WireEnvelope::new(&self.identifier, &body)?.encode())
    }

    /// Publish once per topic. Never fails: an unavailable medium turns this
    /// into a no-op with a warning. Returns how many deliveries happened.
    pub fn publish(&self, medium: &dyn Medium) -> usize {
        let wire = match self.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                warn!("Failed to encode {} message: {e}", self.identifier);
                return 0;
            }
        };

        let mut delivered = 0;
        for topic in &self.topics {
            match medium.publish(&topic.to_string(), &wire) {
                Ok(count) => delivered += count,
                Err(e) => {
                    warn!(
                        "Broadcast medium unavailable, dropping {} message: {e}",
                        self.identifier
                    );
                    break;
                }
            }
        }
        delivered
    }
}
