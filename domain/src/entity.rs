use crate::error::Error;
use crate::identity::Identity;
use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of change that happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Saved,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Saved => "saved",
            Action::Deleted => "deleted",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of an entity as handed over by the host application.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Primary key, any JSON scalar.
    pub pk: Value,
    /// The remaining attributes, opaque to the gateway.
    pub fields: Value,
}

impl Entity {
    pub fn new(pk: impl Into<Value>, fields: Value) -> Self {
        Self {
            pk: pk.into(),
            fields,
        }
    }
}

/// Capability bundle supplied by the host application for every entity type
/// whose changes are relayed to clients.
///
/// Only `lookup` is mandatory; the defaults admit every identity, notify on
/// every change and serialize an entity as `{"pk": <pk>}`.
#[async_trait]
pub trait Listenable: Send + Sync {
    /// Re-resolves an entity by primary key at delivery time.
    /// Returns a `NotFound` error when the entity no longer exists.
    async fn lookup(&self, pk: &Value) -> Result<Entity, Error>;

    fn has_access(&self, _entity: &Entity, _identity: &Identity) -> bool {
        true
    }

    /// Evaluated at publish time.
    fn should_notify(&self, _entity: &Entity, _action: Action) -> bool {
        true
    }

    fn serialize(&self, entity: &Entity) -> Value {
        json!({ "pk": entity.pk })
    }
}

/// Dotted `namespace.kind` path identifying a listenable entity type.
pub fn model_path(namespace: &str, kind: &str) -> String {
    format!("{namespace}.{kind}")
}

/// Registration table of listenable entity types, keyed by `namespace.kind`.
/// Populated once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ListenableRegistry {
    listenables: HashMap<String, Arc<dyn Listenable>>,
}

impl ListenableRegistry {
    pub fn new() -> Self {
        Self {
            listenables: HashMap::new(),
        }
    }

    pub fn register<L: Listenable + 'static>(
        &mut self,
        namespace: &str,
        kind: &str,
        listenable: L,
    ) -> Result<(), Error> {
        let path = model_path(namespace, kind);
        if self.listenables.contains_key(&path) {
            return Err(Error::already_registered(path));
        }

        debug!("Registered listenable entity type {path}");
        self.listenables.insert(path, Arc::new(listenable));
        Ok(())
    }

    pub fn get(&self, namespace: &str, kind: &str) -> Option<&Arc<dyn Listenable>> {
        self.listenables.get(&model_path(namespace, kind))
    }

    pub fn len(&self) -> usize {
        self.listenables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listenables.is_empty()
    }
}
