//! Error types for the broadcast medium.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, PartialEq)]
pub struct Error {
    pub error_kind: HubErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum HubErrorKind {
    /// The medium has been shut down or never became reachable.
    Unavailable,
}

impl Error {
    pub fn unavailable() -> Self {
        Error {
            error_kind: HubErrorKind::Unavailable,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hub Error: {:?}", self.error_kind)
    }
}

impl StdError for Error {}
