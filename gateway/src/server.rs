use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{State, WebSocketUpgrade};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use domain::SessionStore;
use hub::Medium;
use log::*;
use messages::{Message, Registry, Topic};
use service::config::{Config, PermissionPolicy};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::error::Error;
use crate::protect::{HandshakeRequest, PermissionChain};
use crate::registry::ConnectionRegistry;

/// Builds one hello packet. Invoked for every new connection.
pub type HelloFactory = Arc<dyn Fn() -> Message + Send + Sync>;

/// Settings of one gateway instance.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Shows up in log lines to tell instances apart.
    pub name: String,
    pub policy: PermissionPolicy,
    pub token_param: String,
    /// `None` disables keepalive pings.
    pub keepalive_interval: Option<Duration>,
    pub poll_timeout: Duration,
    pub hello: Vec<HelloFactory>,
}

impl GatewayConfig {
    pub fn new(name: impl Into<String>, policy: PermissionPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            token_param: "token".to_string(),
            keepalive_interval: Some(Duration::from_secs(20)),
            poll_timeout: Duration::from_secs(1),
            hello: Vec::new(),
        }
    }

    /// Gateway settings shared by every instance of the process, with the
    /// configured hello values sent as generic messages.
    pub fn from_config(
        config: &Config,
        name: impl Into<String>,
        policy: PermissionPolicy,
    ) -> Result<Self, serde_json::Error> {
        let mut gateway = Self::new(name, policy);
        gateway.token_param = config.token_param.clone();
        gateway.keepalive_interval = config.keepalive_interval();
        gateway.poll_timeout = config.poll_timeout();

        for value in config.hello_messages()? {
            gateway = gateway.with_hello(move || Message::generic(vec![Topic::root()], value.clone()));
        }
        Ok(gateway)
    }

    pub fn with_hello<F>(mut self, build: F) -> Self
    where
        F: Fn() -> Message + Send + Sync + 'static,
    {
        self.hello.push(Arc::new(build));
        self
    }
}

/// Shared state handed to every upgrade request and connection task.
#[derive(Clone)]
pub struct GatewayState {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) chain: Arc<PermissionChain>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) medium: Arc<dyn Medium>,
    pub(crate) messages: Arc<Registry>,
    pub(crate) connections: Arc<ConnectionRegistry>,
}

/// A websocket endpoint relaying broadcast messages to its clients.
///
/// Several gateways may share one medium, each with its own permission chain
/// and message registry.
pub struct Gateway {
    state: GatewayState,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        medium: Arc<dyn Medium>,
        messages: Arc<Registry>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let chain = PermissionChain::new(config.policy);
        Self {
            state: GatewayState {
                config: Arc::new(config),
                chain: Arc::new(chain),
                sessions,
                medium,
                messages,
                connections: Arc::new(ConnectionRegistry::new()),
            },
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.state.connections
    }

    /// Every path accepts websocket upgrades.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(ws_handler)
            .with_state(self.state.clone())
    }

    /// Binds `address` and serves connections on a background task.
    ///
    /// Only the bind itself can fail; once listening, per-connection failures
    /// never stop the accept loop.
    pub async fn bind(self, address: &str) -> Result<(SocketAddr, JoinHandle<()>), Error> {
        let listener = TcpListener::bind(address).await.map_err(Error::bind)?;
        let local_address = listener.local_addr().map_err(Error::bind)?;
        info!(
            "{} gateway listening on {local_address} ({} permission chain)",
            self.state.config.name,
            self.state.chain.policy()
        );

        let name = self.state.config.name.clone();
        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("{name} gateway stopped accepting connections: {e}");
            }
        });

        Ok((local_address, handle))
    }
}

/// Runs the permission chain, then upgrades. A rejected handshake never
/// reaches the websocket protocol.
async fn ws_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = HandshakeRequest::new(&uri, headers, &state.config.token_param);

    let identity = match state.chain.authorize(state.sessions.as_ref(), request).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| Connection::accept(socket, identity, state).run())
}
