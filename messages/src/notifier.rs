use crate::entity_changed::EntityChange;
use crate::message::Message;
use domain::{Action, Entity, ListenableRegistry};
use hub::Medium;
use log::*;
use std::sync::Arc;

/// Publish side of entity change notifications.
///
/// The host application calls [`ChangeNotifier::notify`] after it created,
/// saved or is about to delete an entity. Nothing here ever fails the caller:
/// unknown entity types are ignored and an unavailable medium degrades to
/// "no live updates".
#[derive(Clone)]
pub struct ChangeNotifier {
    listenables: Arc<ListenableRegistry>,
    medium: Arc<dyn Medium>,
}

impl ChangeNotifier {
    pub fn new(listenables: Arc<ListenableRegistry>, medium: Arc<dyn Medium>) -> Self {
        Self {
            listenables,
            medium,
        }
    }

    /// Registered, and its `should_notify` agrees.
    pub fn is_listenable(&self, namespace: &str, kind: &str, entity: &Entity, action: Action) -> bool {
        match self.listenables.get(namespace, kind) {
            Some(listenable) => listenable.should_notify(entity, action),
            None => false,
        }
    }

    /// Returns how many subscriptions received the change.
    pub fn notify(&self, namespace: &str, kind: &str, action: Action, entity: &Entity) -> usize {
        if !self.is_listenable(namespace, kind, entity, action) {
            return 0;
        }

        info!("Entity changed: {namespace}-{kind}:{action}:{}", entity.pk);

        let change = EntityChange::new(namespace, kind, action, entity.pk.clone());
        Message::from(change).publish(self.medium.as_ref())
    }

    /// Publish an arbitrary message through the same medium.
    pub fn publish(&self, message: &Message) -> usize {
        message.publish(self.medium.as_ref())
    }
}
