use crate::message::{Decoded, Message, MessageType};
use crate::topic::Topic;
use async_trait::async_trait;
use domain::entity::model_path;
use domain::{Action, Entity, Identity, Listenable, ListenableRegistry};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const ENTITY_CHANGED_IDENTIFIER: &str = "model";

/// Wire body of an entity change: `{"app", "model", "action", "pk"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    #[serde(rename = "app")]
    pub namespace: String,
    #[serde(rename = "model")]
    pub kind: String,
    pub action: Action,
    pub pk: Value,
}

impl EntityChange {
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        action: Action,
        pk: impl Into<Value>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            action,
            pk: pk.into(),
        }
    }

    pub fn model_path(&self) -> String {
        model_path(&self.namespace, &self.kind)
    }

    /// `root`, `root/{namespace}-{kind}`, `root/{namespace}-{kind}/{action}`
    pub fn topics(&self) -> Vec<Topic> {
        Topic::root()
            .child(format!("{}-{}", self.namespace, self.kind))
            .child(self.action.as_str())
            .prefixes()
    }
}

impl From<EntityChange> for Message {
    fn from(change: EntityChange) -> Self {
        let topics = change.topics();
        let data = json!({
            "app": change.namespace,
            "model": change.kind,
            "action": change.action,
            "pk": change.pk,
        });
        Message::with_known_identifier(ENTITY_CHANGED_IDENTIFIER, topics, data)
    }
}

/// An entity change whose entity has been re-resolved at delivery time.
pub struct ResolvedChange {
    change: EntityChange,
    entity: Entity,
    listenable: Arc<dyn Listenable>,
}

/// Create/update/delete notifications for listenable entity types.
///
/// Delivery re-resolves the entity through its registered [`Listenable`], so
/// clients always receive current data and access is checked against the
/// entity as it is now.
pub struct EntityChanged {
    listenables: Arc<ListenableRegistry>,
}

impl EntityChanged {
    pub fn new(listenables: Arc<ListenableRegistry>) -> Self {
        Self { listenables }
    }
}

#[async_trait]
impl MessageType for EntityChanged {
    type Payload = ResolvedChange;

    fn identifier(&self) -> &str {
        ENTITY_CHANGED_IDENTIFIER
    }

    async fn decode(&self, body: &str) -> Decoded<ResolvedChange> {
        let change: EntityChange = match serde_json::from_str(body) {
            Ok(change) => change,
            Err(e) => return Decoded::Malformed(format!("invalid entity change: {e}")),
        };

        let listenable = match self.listenables.get(&change.namespace, &change.kind) {
            Some(listenable) => Arc::clone(listenable),
            None => {
                return Decoded::Malformed(format!("{} is not listenable", change.model_path()))
            }
        };

        match listenable.lookup(&change.pk).await {
            Ok(entity) => Decoded::Decoded(ResolvedChange {
                change,
                entity,
                listenable,
            }),
            Err(e) => {
                warn!(
                    "Dropping {}:{}:{}, entity could not be resolved: {e}",
                    change.model_path(),
                    change.action,
                    change.pk
                );
                Decoded::Malformed(format!("{} {} not found", change.model_path(), change.pk))
            }
        }
    }

    fn authorize(&self, payload: &ResolvedChange, identity: &Identity) -> bool {
        payload.listenable.has_access(&payload.entity, identity)
    }

    fn prepare(&self, payload: ResolvedChange, _identity: &Identity) -> Value {
        json!({
            "model": payload.change.model_path(),
            "action": payload.change.action,
            "pk": payload.change.pk,
            "data": payload.listenable.serialize(&payload.entity),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Outcome, Relay};
    use domain::error::Error as DomainError;
    use domain::User;

    /// Posts 1..=9 exist; only staff may see odd ones.
    struct Posts;

    #[async_trait]
    impl Listenable for Posts {
        async fn lookup(&self, pk: &Value) -> Result<Entity, DomainError> {
            match pk.as_i64() {
                Some(id @ 1..=9) => Ok(Entity::new(id, json!({"title": format!("post {id}")}))),
                _ => Err(DomainError::not_found()),
            }
        }

        fn has_access(&self, entity: &Entity, identity: &Identity) -> bool {
            entity.pk.as_i64().map(|id| id % 2 == 0).unwrap_or(false) || identity.is_staff()
        }

        fn serialize(&self, entity: &Entity) -> Value {
            json!({"pk": entity.pk, "title": entity.fields["title"]})
        }
    }

    fn entity_changed() -> EntityChanged {
        let mut listenables = ListenableRegistry::new();
        listenables.register("blog", "post", Posts).unwrap();
        EntityChanged::new(Arc::new(listenables))
    }

    fn staff() -> Identity {
        Identity::from(User {
            id: "9".to_string(),
            username: "editor".to_string(),
            is_staff: true,
            is_superuser: false,
        })
    }

    #[test]
    fn topics_form_the_three_level_hierarchy() {
        let change = EntityChange::new("blog", "post", Action::Saved, 7);
        let topics: Vec<String> = change.topics().iter().map(Topic::to_string).collect();
        assert_eq!(topics, vec!["root", "root/blog-post", "root/blog-post/saved"]);
    }

    #[test]
    fn message_body_uses_the_wire_field_names() {
        let message = Message::from(EntityChange::new("blog", "post", Action::Created, 7));
        assert_eq!(message.identifier(), ENTITY_CHANGED_IDENTIFIER);
        assert_eq!(
            message.data(),
            &json!({"app": "blog", "model": "post", "action": "created", "pk": 7})
        );
    }

    #[tokio::test]
    async fn prepared_frame_carries_serialized_entity() {
        let outcome = entity_changed()
            .relay(
                r#"{"app":"blog","model":"post","action":"saved","pk":4}"#,
                &Identity::Anonymous,
            )
            .await;

        assert_eq!(
            outcome,
            Outcome::Deliver(json!({
                "model": "blog.post",
                "action": "saved",
                "pk": 4,
                "data": {"pk": 4, "title": "post 4"},
            }))
        );
    }

    #[tokio::test]
    async fn veto_depends_on_the_identity() {
        let body = r#"{"app":"blog","model":"post","action":"saved","pk":7}"#;
        let message_type = entity_changed();

        assert!(matches!(
            message_type.relay(body, &Identity::Anonymous).await,
            Outcome::Vetoed(_)
        ));
        assert!(matches!(
            message_type.relay(body, &staff()).await,
            Outcome::Deliver(_)
        ));
    }

    #[tokio::test]
    async fn vanished_entity_is_dropped() {
        let outcome = entity_changed()
            .relay(
                r#"{"app":"blog","model":"post","action":"deleted","pk":42}"#,
                &staff(),
            )
            .await;
        assert!(matches!(outcome, Outcome::Malformed(_)));
    }

    #[tokio::test]
    async fn unregistered_entity_type_is_dropped() {
        let outcome = entity_changed()
            .relay(
                r#"{"app":"blog","model":"comment","action":"saved","pk":1}"#,
                &staff(),
            )
            .await;
        assert!(matches!(outcome, Outcome::Malformed(_)));
    }

    #[tokio::test]
    async fn unknown_action_is_dropped() {
        let outcome = entity_changed()
            .relay(
                r#"{"app":"blog","model":"post","action":"archived","pk":1}"#,
                &staff(),
            )
            .await;
        assert!(matches!(outcome, Outcome::Malformed(_)));
    }
}
