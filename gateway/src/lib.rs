//! Websocket gateway relaying broadcast messages to connected clients.
//!
//! - `protect`: permission chain evaluated before the upgrade
//! - `connection`: per-connection hello burst, relay loop, keepalive and teardown
//! - `registry`: open connections of one gateway instance
//! - `server`: axum accept loop binding it all together

pub mod connection;
pub mod error;
pub mod protect;
pub mod registry;
pub mod server;

pub use connection::{Connection, ConnectionState};
pub use error::Error;
pub use protect::{Check, HandshakeRequest, PermissionChain, Predicate};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use server::{Gateway, GatewayConfig, HelloFactory};
