//! Domain types shared by every layer of the gateway.
//!
//! The gateway never owns the data store that produces change events. What it
//! needs from the outside world is expressed here as two seams:
//!
//! - [`identity::SessionStore`] resolves the session key presented during the
//!   websocket handshake into an [`identity::Identity`].
//! - [`entity::Listenable`] is the capability bundle supplied per entity type
//!   (`lookup`, `has_access`, `serialize`, `should_notify`). Bundles are
//!   registered once at startup in an [`entity::ListenableRegistry`].
//!
//! Entity data is carried as `serde_json::Value` so that this crate has no
//! dependency on whatever persistence layer the host application uses.

pub mod entity;
pub mod error;
pub mod identity;

pub use entity::{Action, Entity, Listenable, ListenableRegistry};
pub use identity::{Identity, MemorySessionStore, SessionStore, User};
