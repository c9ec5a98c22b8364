use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: GatewayErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum GatewayErrorKind {
    /// The listening socket could not be bound. Fatal at startup.
    Bind,
    /// A permission chain layer turned the handshake down.
    Rejected(String),
    /// The websocket failed while sending or receiving.
    Socket,
}

impl Error {
    pub fn bind(source: std::io::Error) -> Self {
        Self {
            source: Some(Box::new(source)),
            error_kind: GatewayErrorKind::Bind,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            source: None,
            error_kind: GatewayErrorKind::Rejected(reason.into()),
        }
    }

    pub fn socket(source: axum::Error) -> Self {
        Self {
            source: Some(Box::new(source)),
            error_kind: GatewayErrorKind::Socket,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_kind {
            GatewayErrorKind::Bind => write!(f, "Failed to bind listener")?,
            GatewayErrorKind::Rejected(reason) => write!(f, "Permission denied: {reason}")?,
            GatewayErrorKind::Socket => write!(f, "Websocket failure")?,
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

// The rejection reason stays in the server log; clients only learn that the
// handshake was refused.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.error_kind {
            GatewayErrorKind::Rejected(_) => {
                (StatusCode::FORBIDDEN, "Permission denied").into_response()
            }
            GatewayErrorKind::Bind | GatewayErrorKind::Socket => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}
