//! Error types for the message layer.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: MessagesErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum MessagesErrorKind {
    /// Identifier is empty or contains the envelope separator.
    InvalidIdentifier(String),
    /// Identifier is already present in the registry.
    DuplicateIdentifier(String),
    /// A message body could not be serialized.
    Serialization,
}

impl Error {
    pub fn invalid_identifier(identifier: &str) -> Self {
        Error {
            source: None,
            error_kind: MessagesErrorKind::InvalidIdentifier(identifier.to_string()),
        }
    }

    pub fn duplicate_identifier(identifier: &str) -> Self {
        Error {
            source: None,
            error_kind: MessagesErrorKind::DuplicateIdentifier(identifier.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Messages Error: {:?}", self.error_kind)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: MessagesErrorKind::Serialization,
        }
    }
}
