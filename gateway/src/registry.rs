use dashmap::DashMap;
use domain::Identity;
use log::*;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The open connections of one gateway instance.
///
/// Entries are only ever written by the connection they describe: inserted
/// after the handshake, removed during teardown.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Identity>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, identity: &Identity) -> ConnectionId {
        let connection_id = ConnectionId::new();
        self.connections
            .insert(connection_id.clone(), identity.clone());
        connection_id
    }

    /// Returns false when the connection was already gone.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        match self.connections.remove(connection_id) {
            Some((_, identity)) => {
                trace!(
                    "Connection {} of {} unregistered",
                    connection_id.as_str(),
                    identity.label()
                );
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registration_gets_its_own_id() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(&Identity::Anonymous);
        let second = registry.register(&Identity::Anonymous);

        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(&Identity::Anonymous);

        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert!(registry.is_empty());
    }
}
