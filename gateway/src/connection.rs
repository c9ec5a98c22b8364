//! One client connection, from accepted handshake to teardown.
//!
//! `Handshaking -> HelloBurst -> Relaying -> Closing -> Closed`
//!
//! The handshake itself runs in the upgrade handler (see `protect`); a
//! [`Connection`] only exists for handshakes that passed the permission chain.
//! Everything a connection owns (socket, subscription, ping timer) is touched
//! by its own task only.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message as Frame, WebSocket};
use domain::Identity;
use futures::FutureExt;
use hub::{Poll, Subscription};
use log::*;
use messages::{Outcome, ROOT_TOPIC};
use serde_json::Value;

use crate::error::Error;
use crate::registry::ConnectionId;
use crate::server::GatewayState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    HelloBurst,
    Relaying,
    Closing,
    Closed,
}

pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    socket: WebSocket,
    subscription: Option<Subscription>,
    state: ConnectionState,
    last_ping: Instant,
    gateway: GatewayState,
}

impl Connection {
    /// Registers an upgraded socket whose handshake resolved to `identity`.
    pub(crate) fn accept(socket: WebSocket, identity: Identity, gateway: GatewayState) -> Self {
        let id = gateway.connections.register(&identity);
        info!(
            "Connection {} accepted on {} gateway for {} ({} open)",
            id.as_str(),
            gateway.config.name,
            identity.label(),
            gateway.connections.len()
        );

        Self {
            id,
            identity,
            socket,
            subscription: None,
            state: ConnectionState::Handshaking,
            last_ping: Instant::now(),
            gateway,
        }
    }

    pub async fn run(mut self) {
        // Subscribe first so nothing published during the burst is missed.
        self.subscribe();

        self.transition(ConnectionState::HelloBurst);
        let result = match self.hello_burst().await {
            Ok(()) => {
                self.transition(ConnectionState::Relaying);
                self.relay().await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            debug!("Connection {} ended with {e}", self.id.as_str());
        }
        self.close().await;
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!(
            "Connection {}: {:?} -> {next:?}",
            self.id.as_str(),
            self.state
        );
        self.state = next;
    }

    fn subscribe(&mut self) {
        match self.gateway.medium.subscribe(ROOT_TOPIC) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => warn!(
                "Connection {} will not receive live updates: {e}",
                self.id.as_str()
            ),
        }
    }

    async fn hello_burst(&mut self) -> Result<(), Error> {
        let config = Arc::clone(&self.gateway.config);

        for build in &config.hello {
            let message = build();
            let body = match message.body() {
                Ok(body) => body,
                Err(e) => {
                    warn!("Skipping hello {} message: {e}", message.identifier());
                    continue;
                }
            };

            let prepare = self
                .gateway
                .messages
                .prepare(message.identifier(), &body, &self.identity);
            match AssertUnwindSafe(prepare).catch_unwind().await {
                Ok(outcome) => self.handle(outcome).await?,
                Err(_) => error!(
                    "Preparing hello {} message for connection {} panicked, skipping it",
                    message.identifier(),
                    self.id.as_str()
                ),
            }
        }
        Ok(())
    }

    async fn relay(&mut self) -> Result<(), Error> {
        loop {
            let wait = self.next_wait();

            tokio::select! {
                frame = self.socket.recv() => match frame {
                    None | Some(Ok(Frame::Close(_))) => return Ok(()),
                    Some(Err(e)) => return Err(Error::socket(e)),
                    // Clients have nothing to say on this channel.
                    Some(Ok(_)) => {}
                },
                polled = next_broadcast(self.subscription.as_mut(), wait) => match polled {
                    Poll::Message(raw) => self.deliver(&raw).await?,
                    Poll::Empty => {}
                    Poll::Closed => {
                        warn!(
                            "Broadcast medium closed, connection {} will not receive live updates",
                            self.id.as_str()
                        );
                        self.subscription = None;
                    }
                },
            }

            self.keepalive().await?;
        }
    }

    /// Bounded by the poll timeout and by the next keepalive deadline.
    fn next_wait(&self) -> Duration {
        let poll_timeout = self.gateway.config.poll_timeout;
        match self.gateway.config.keepalive_interval {
            Some(interval) => poll_timeout.min(interval.saturating_sub(self.last_ping.elapsed())),
            None => poll_timeout,
        }
    }

    async fn keepalive(&mut self) -> Result<(), Error> {
        let Some(interval) = self.gateway.config.keepalive_interval else {
            return Ok(());
        };

        if self.last_ping.elapsed() >= interval {
            self.socket
                .send(Frame::Ping(Bytes::new()))
                .await
                .map_err(Error::socket)?;
            self.last_ping = Instant::now();
        }
        Ok(())
    }

    async fn deliver(&mut self, raw: &str) -> Result<(), Error> {
        let dispatch = self.gateway.messages.dispatch(raw, &self.identity);
        let outcome = AssertUnwindSafe(dispatch).catch_unwind().await;

        match outcome {
            Ok(outcome) => self.handle(outcome).await,
            Err(_) => {
                error!(
                    "Relaying a message to connection {} panicked, skipping it",
                    self.id.as_str()
                );
                Ok(())
            }
        }
    }

    async fn handle(&mut self, outcome: Outcome) -> Result<(), Error> {
        match outcome {
            Outcome::Deliver(payload) => self.send(payload).await,
            Outcome::Malformed(reason) => {
                debug!(
                    "Dropping malformed message for connection {}: {reason}",
                    self.id.as_str()
                );
                Ok(())
            }
            Outcome::Vetoed(reason) => {
                debug!("{reason}");
                Ok(())
            }
        }
    }

    async fn send(&mut self, payload: Value) -> Result<(), Error> {
        let text = match payload {
            Value::String(text) => text,
            other => other.to_string(),
        };

        self.socket
            .send(Frame::Text(text.into()))
            .await
            .map_err(Error::socket)
    }

    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return;
        }
        self.transition(ConnectionState::Closing);

        self.release();
        if let Err(e) = self.socket.send(Frame::Close(None)).await {
            trace!(
                "Close frame not sent to connection {}: {e}",
                self.id.as_str()
            );
        }

        self.transition(ConnectionState::Closed);
        info!("Connection {} closed", self.id.as_str());
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.gateway.medium.unsubscribe(subscription);
        }
        self.gateway.connections.unregister(&self.id);
    }
}

// Covers tasks that are aborted or panic outside the per-message guard.
impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

async fn next_broadcast(subscription: Option<&mut Subscription>, wait: Duration) -> Poll {
    match subscription {
        Some(subscription) => subscription.poll(wait).await,
        None => {
            tokio::time::sleep(wait).await;
            Poll::Empty
        }
    }
}
