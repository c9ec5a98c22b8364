//! Message types, wire encoding and topic conventions of the gateway.
//!
//! # Architecture
//!
//! - **Topic**: hierarchical topic paths; a message is published once per
//!   prefix of its full topic so subscribers can listen at any granularity.
//! - **WireEnvelope**: `"<identifier>:<json-body>"`, the text carried by the
//!   broadcast medium.
//! - **MessageType**: decode, authorize and prepare contract of one kind of
//!   message. [`Generic`] passes its payload through, [`EntityChanged`]
//!   re-resolves the changed entity and checks access per connection.
//! - **Registry**: identifier to message type table, built at startup and
//!   read-only afterwards.
//! - **ChangeNotifier**: publish side for entity changes.
//!
//! Dropping a message is never an error here. Decode and authorize return
//! explicit outcomes ([`Decoded`], [`Authorization`], [`Outcome`]) which the
//! relay loop branches on.

pub mod entity_changed;
pub mod envelope;
pub mod error;
pub mod generic;
pub mod message;
pub mod notifier;
pub mod registry;
pub mod topic;

pub use entity_changed::{EntityChange, EntityChanged, ENTITY_CHANGED_IDENTIFIER};
pub use envelope::{WireEnvelope, ENVELOPE_SEPARATOR};
pub use generic::{Generic, GENERIC_IDENTIFIER};
pub use message::{Authorization, Decoded, Message, MessageType, Outcome, Relay};
pub use notifier::ChangeNotifier;
pub use registry::Registry;
pub use topic::{Topic, ROOT_TOPIC, TOPIC_SEPARATOR};
