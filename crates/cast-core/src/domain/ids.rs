//! Identifier and payload newtypes.
//!
//! The relay keys every participant by the identifier the transport assigned
//! to its connection.  Wrapping that string in [`ConnectionId`] keeps it from
//! being mixed up with any other string (payloads, message names, log tags).
//!
//! Session descriptions and network-path candidates are produced and consumed
//! by the browsers' media stack.  The relay stores and forwards them as
//! [`SignalPayload`] without ever looking inside.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one transport connection (one host or one viewer page).
///
/// Serialized as a bare JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wraps an identifier that was already assigned by the transport.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier for a newly accepted connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// An opaque signaling payload: an offer, an answer, or a candidate.
///
/// Any JSON value is accepted (browsers usually send an object such as
/// `{"type":"offer","sdp":"v=0..."}`), and it is forwarded byte-for-byte
/// equivalent after a JSON round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(serde_json::Value);

impl SignalPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for SignalPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
