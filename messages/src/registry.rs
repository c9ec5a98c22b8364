use crate::entity_changed::EntityChanged;
use crate::envelope::{validate_identifier, WireEnvelope};
use crate::error::Error;
use crate::generic::Generic;
use crate::message::{Decoded, MessageType, Outcome, Relay};
use domain::{Identity, ListenableRegistry};
use log::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps wire identifiers to message types.
///
/// Built once at startup and shared behind an `Arc`; lookups afterwards are
/// plain reads and need no synchronization.
#[derive(Default)]
pub struct Registry {
    relays: HashMap<String, Arc<dyn Relay>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            relays: HashMap::new(),
        }
    }

    /// The registry of the data relay instance: generic and entity-changed
    /// messages.
    pub fn with_defaults(listenables: Arc<ListenableRegistry>) -> Self {
        let mut registry = Self::generic_only();
        let entity_changed = EntityChanged::new(listenables);
        registry.relays.insert(
            entity_changed.identifier().to_string(),
            Arc::new(entity_changed),
        );
        registry
    }

    /// The registry of the control instance: generic messages only.
    pub fn generic_only() -> Self {
        let mut registry = Self::new();
        let generic = Generic::default();
        registry
            .relays
            .insert(generic.identifier().to_string(), Arc::new(generic));
        registry
    }

    pub fn register(&mut self, identifier: &str, relay: Arc<dyn Relay>) -> Result<(), Error> {
        validate_identifier(identifier)?;
        if self.relays.contains_key(identifier) {
            return Err(Error::duplicate_identifier(identifier));
        }

        debug!("Registered message type {identifier}");
        self.relays.insert(identifier.to_string(), relay);
        Ok(())
    }

    /// Register a message type under its own identifier.
    pub fn register_type<T: MessageType>(&mut self, message_type: T) -> Result<(), Error> {
        let identifier = message_type.identifier().to_string();
        self.register(&identifier, Arc::new(message_type))
    }

    pub fn lookup(&self, identifier: &str) -> Option<&Arc<dyn Relay>> {
        self.relays.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.relays.keys().map(String::as_str)
    }

    /// Decode, authorize and prepare a body under a known identifier.
    pub async fn prepare(&self, identifier: &str, body: &str, identity: &Identity) -> Outcome {
        match self.lookup(identifier) {
            Some(relay) => relay.relay(body, identity).await,
            None => Outcome::Malformed(format!("unknown identifier {identifier:?}")),
        }
    }

    /// Run one raw broadcast payload through the full pipeline for `identity`.
    pub async fn dispatch(&self, raw: &str, identity: &Identity) -> Outcome {
        match WireEnvelope::parse(raw) {
            Decoded::Decoded(envelope) => {
                self.prepare(envelope.identifier, envelope.body, identity)
                    .await
            }
            Decoded::Malformed(reason) => Outcome::Malformed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagesErrorKind;
    use serde_json::json;

    #[test]
    fn lookup_returns_the_registered_instance() {
        let mut registry = Registry::new();
        let notice: Arc<dyn Relay> = Arc::new(Generic::new("notice").unwrap());
        registry.register("notice", Arc::clone(&notice)).unwrap();

        assert!(Arc::ptr_eq(registry.lookup("notice").unwrap(), &notice));
    }

    #[test]
    fn lookup_of_unknown_identifier_is_none() {
        let registry = Registry::generic_only();
        assert!(registry.lookup("model").is_none());
        assert!(registry.lookup("").is_none());
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::generic_only();
        let err = registry.register_type(Generic::default()).unwrap_err();
        assert_eq!(
            err.error_kind,
            MessagesErrorKind::DuplicateIdentifier("base".to_string())
        );
    }

    #[test]
    fn defaults_cover_generic_and_entity_changes() {
        let registry = Registry::with_defaults(Arc::new(ListenableRegistry::new()));
        let mut identifiers: Vec<&str> = registry.identifiers().collect();
        identifiers.sort_unstable();
        assert_eq!(identifiers, vec!["base", "model"]);
    }

    #[tokio::test]
    async fn dispatch_drops_malformed_envelopes() {
        let registry = Registry::generic_only();
        for raw in ["no separator", ":{}", "base:", "unknown:{}", "base:{not json"] {
            assert!(
                matches!(
                    registry.dispatch(raw, &Identity::Anonymous).await,
                    Outcome::Malformed(_)
                ),
                "{raw:?} should be dropped"
            );
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_valid_generic_messages() {
        let registry = Registry::generic_only();
        assert_eq!(
            registry
                .dispatch(r#"base:{"hello":"world"}"#, &Identity::Anonymous)
                .await,
            Outcome::Deliver(json!({"hello": "world"}))
        );
    }
}
