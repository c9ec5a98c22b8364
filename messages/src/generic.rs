use crate::envelope::validate_identifier;
use crate::error::Error;
use crate::message::{Decoded, Message, MessageType};
use crate::topic::Topic;
use async_trait::async_trait;
use domain::Identity;
use serde_json::Value;

pub const GENERIC_IDENTIFIER: &str = "base";

/// Pass-through message: whatever JSON was published is delivered verbatim to
/// every admitted connection.
#[derive(Debug, Clone)]
pub struct Generic {
    identifier: String,
}

impl Generic {
    pub fn new(identifier: impl Into<String>) -> Result<Self, Error> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self { identifier })
    }
}

impl Default for Generic {
    fn default() -> Self {
        Self {
            identifier: GENERIC_IDENTIFIER.to_string(),
        }
    }
}

#[async_trait]
impl MessageType for Generic {
    type Payload = Value;

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn decode(&self, body: &str) -> Decoded<Value> {
        match serde_json::from_str(body) {
            Ok(payload) => Decoded::Decoded(payload),
            Err(e) => Decoded::Malformed(format!("invalid JSON body: {e}")),
        }
    }

    fn prepare(&self, payload: Value, _identity: &Identity) -> Value {
        payload
    }
}

impl Message {
    /// A generic message published on each of `topics`.
    pub fn generic(topics: Vec<Topic>, data: Value) -> Self {
        Message::with_known_identifier(GENERIC_IDENTIFIER, topics, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Outcome, Relay};
    use serde_json::json;

    #[tokio::test]
    async fn payload_is_passed_through_for_anyone() {
        let generic = Generic::default();
        assert_eq!(
            generic
                .relay(r#"{"kind":"notice","n":[1,2]}"#, &Identity::Anonymous)
                .await,
            Outcome::Deliver(json!({"kind": "notice", "n": [1, 2]}))
        );
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let generic = Generic::default();
        assert!(matches!(
            generic.relay("{oops", &Identity::Anonymous).await,
            Outcome::Malformed(_)
        ));
    }

    #[test]
    fn custom_identifiers_are_validated() {
        assert!(Generic::new("notice").is_ok());
        assert!(Generic::new("no:tice").is_err());
    }

    #[test]
    fn generic_message_uses_the_base_identifier() {
        let message = Message::generic(vec![Topic::root()], json!({"a": 1}));
        assert_eq!(message.identifier(), GENERIC_IDENTIFIER);
        assert_eq!(message.to_wire().unwrap(), r#"base:{"a":1}"#);
    }
}
