//! JSON codec for signaling frames.
//!
//! Frames are UTF-8 JSON objects with a `"type"` discriminant.  Decoding
//! distinguishes three failure modes so the relay can tell a client developer
//! what went wrong: the text is not JSON, the `type` is not a known message,
//! or the fields do not fit the named message.

use thiserror::Error;

use crate::protocol::messages::{ClientMessage, ServerMessage, CLIENT_MESSAGE_NAMES};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame is not a JSON object.
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    /// The object has no string `"type"` field.
    #[error("missing \"type\" field")]
    MissingType,

    /// The `"type"` field names no known client message.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The message is known but its fields are wrong (missing payload, etc.).
    #[error("invalid fields for {message_type}: {reason}")]
    InvalidFields {
        message_type: String,
        reason: String,
    },

    /// A server message could not be serialized.
    #[error("failed to serialize {message_type}: {reason}")]
    Serialize {
        message_type: &'static str,
        reason: String,
    },
}

/// Decodes one client frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the text is not a JSON object, has no
/// `"type"`, names an unknown message, or carries invalid fields.
///
/// # Examples
///
/// ```rust
/// use cast_core::protocol::{decode_client_message, ClientMessage};
///
/// let msg = decode_client_message(r#"{"type":"request-stream"}"#).unwrap();
/// assert_eq!(msg, ClientMessage::RequestStream);
/// ```
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(ProtocolError::MalformedJson(
            "frame is not a JSON object".to_string(),
        ));
    };

    let message_type = object
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    if !CLIENT_MESSAGE_NAMES.contains(&message_type) {
        return Err(ProtocolError::UnknownMessageType(message_type.to_string()));
    }
    let message_type = message_type.to_string();

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidFields {
        message_type,
        reason: e.to_string(),
    })
}

/// Encodes one server frame as JSON text.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if serialization fails, which only
/// happens if a payload holds a value JSON cannot represent.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Serialize {
        message_type: msg.name(),
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
