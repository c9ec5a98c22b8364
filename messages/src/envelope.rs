use crate::error::Error;
use crate::message::Decoded;

/// Separator between identifier and body on the wire. Never valid inside an identifier.
pub const ENVELOPE_SEPARATOR: char = ':';

/// A raw broadcast payload split into `identifier` and JSON `body`.
///
/// Wire format: `"<identifier>:<json-body>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireEnvelope<'a> {
    pub identifier: &'a str,
    pub body: &'a str,
}

/// Checks that `identifier` can be used as an envelope prefix.
pub fn validate_identifier(identifier: &str) -> Result<(), Error> {
    if identifier.is_empty() || identifier.contains(ENVELOPE_SEPARATOR) {
        return Err(Error::invalid_identifier(identifier));
    }
    Ok(())
}

impl<'a> WireEnvelope<'a> {
    pub fn new(identifier: &'a str, body: &'a str) -> Result<Self, Error> {
        validate_identifier(identifier)?;
        Ok(Self { identifier, body })
    }

    /// Split at the first separator. A missing separator or an empty half is
    /// malformed.
    pub fn parse(raw: &'a str) -> Decoded<Self> {
        match raw.split_once(ENVELOPE_SEPARATOR) {
            Some((identifier, body)) if !identifier.is_empty() && !body.is_empty() => {
                Decoded::Decoded(Self { identifier, body })
            }
            Some(_) => Decoded::Malformed("empty identifier or body".to_string()),
            None => Decoded::Malformed("missing envelope separator".to_string()),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.identifier, ENVELOPE_SEPARATOR, self.body)
    }
}
