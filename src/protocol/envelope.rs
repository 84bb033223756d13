//! Wire Envelope
//!
//! Every game move and every control action crosses the wire as an
//! [`Envelope`]: a string tag naming the concrete message variant, the
//! originating username (absent for server-generated messages), an
//! optional small-integer status code some message families use to
//! multiplex several logical messages under one tag, and a map of named
//! scalar attributes. The table number is carried out-of-band by the
//! transport frame, never inside the envelope.
//!
//! Client and server agree on the attribute schema for a tag at compile
//! time of the game module; there is no runtime schema negotiation.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Errors raised while decoding an envelope into a typed message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A required attribute was absent.
    #[error("envelope `{tag}` is missing attribute `{attr}`")]
    MissingAttribute {
        /// Tag of the envelope being decoded.
        tag: String,
        /// Name of the absent attribute.
        attr: String,
    },

    /// An attribute was present but could not be parsed.
    #[error("envelope `{tag}` attribute `{attr}` has invalid value `{value}`")]
    InvalidAttribute {
        /// Tag of the envelope being decoded.
        tag: String,
        /// Name of the offending attribute.
        attr: String,
        /// The raw attribute text.
        value: String,
    },

    /// A multiplexed message family got an envelope without a status code.
    #[error("envelope `{tag}` is missing its status discriminator")]
    MissingStatus {
        /// Tag of the envelope being decoded.
        tag: String,
    },

    /// The status discriminator named no known logical message.
    #[error("envelope `{tag}` has unknown status discriminator {status}")]
    UnknownStatus {
        /// Tag of the envelope being decoded.
        tag: String,
        /// The unrecognized discriminator value.
        status: i32,
    },

    /// A decoder was handed an envelope with a different tag.
    #[error("expected envelope `{expected}`, got `{found}`")]
    TagMismatch {
        /// Tag the decoder handles.
        expected: String,
        /// Tag actually present.
        found: String,
    },
}

/// A typed wire message. Immutable once built; discarded after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, String>,
}

impl Envelope {
    /// Create an empty envelope with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            sender: None,
            status: None,
            attrs: BTreeMap::new(),
        }
    }

    /// Attach the originating username.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Attach the status discriminator.
    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    /// Message tag; the dispatch key.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Originating username, if any.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Replace the sender. The server stamps the authenticated username
    /// here before re-broadcasting, so receivers never trust a
    /// client-supplied sender field.
    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    /// Status discriminator, or `MissingStatus` for families that need one.
    pub fn status(&self) -> Result<i32, ProtocolError> {
        self.status.ok_or_else(|| ProtocolError::MissingStatus {
            tag: self.tag.clone(),
        })
    }

    /// Status discriminator if present.
    pub fn status_opt(&self) -> Option<i32> {
        self.status
    }

    /// Set a scalar attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Display) {
        self.attrs.insert(key.into(), value.to_string());
    }

    /// Encode an integer array as a single space-delimited attribute,
    /// length-preserving including zero-length arrays.
    pub fn set_int_array(&mut self, key: impl Into<String>, values: &[i64]) {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.attrs.insert(key.into(), joined);
    }

    /// Raw attribute text, or `MissingAttribute`.
    pub fn attr(&self, key: &str) -> Result<&str, ProtocolError> {
        self.attrs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ProtocolError::MissingAttribute {
                tag: self.tag.clone(),
                attr: key.to_string(),
            })
    }

    /// Attribute parsed as a signed integer.
    pub fn attr_int(&self, key: &str) -> Result<i64, ProtocolError> {
        let raw = self.attr(key)?;
        raw.parse().map_err(|_| ProtocolError::InvalidAttribute {
            tag: self.tag.clone(),
            attr: key.to_string(),
            value: raw.to_string(),
        })
    }

    /// Attribute decoded as an integer array.
    pub fn attr_int_array(&self, key: &str) -> Result<Vec<i64>, ProtocolError> {
        let raw = self.attr(key)?;
        raw.split_whitespace()
            .map(|tok| {
                tok.parse().map_err(|_| ProtocolError::InvalidAttribute {
                    tag: self.tag.clone(),
                    attr: key.to_string(),
                    value: raw.to_string(),
                })
            })
            .collect()
    }

    /// Fail unless this envelope carries the expected tag.
    pub fn expect_tag(&self, expected: &str) -> Result<(), ProtocolError> {
        if self.tag == expected {
            Ok(())
        } else {
            Err(ProtocolError::TagMismatch {
                expected: expected.to_string(),
                found: self.tag.clone(),
            })
        }
    }
}

/// The encode/decode contract each concrete message type owns.
///
/// `decode(encode(m))` must reproduce every field of `m` exactly, for all
/// valid `m`, including zero-length arrays, boundary coordinates, and
/// every value of a status discriminator.
pub trait WireMessage: Sized {
    /// Tag constant; unique within a table's message vocabulary.
    const TAG: &'static str;

    /// Produce an envelope from the typed fields.
    fn encode(&self) -> Envelope;

    /// Reconstruct the typed message from an envelope.
    fn decode(envelope: &Envelope) -> Result<Self, ProtocolError>;
}
