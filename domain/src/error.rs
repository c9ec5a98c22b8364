//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors are modeled as a root `Error` holding an `error_kind` that describes
/// what went wrong, plus an optional `source` carrying the underlying error.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the kinds of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    /// The requested entity does not exist (anymore).
    NotFound,
    /// A registration table already holds an entry under this key.
    AlreadyRegistered(String),
    /// The session store could not be consulted.
    Session,
    /// Invalid configuration data (e.g. a malformed sessions file).
    Config,
}

impl Error {
    pub fn not_found() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::NotFound,
        }
    }

    pub fn already_registered(key: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::AlreadyRegistered(key.into()),
        }
    }

    pub fn session(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            source: Some(source.into()),
            error_kind: DomainErrorKind::Session,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind == DomainErrorKind::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Config,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Config,
        }
    }
}
