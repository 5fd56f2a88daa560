//! Message types for the signaling protocol.
//!
//! Every WebSocket text frame carries one JSON object.  The `"type"` field
//! names the message; all other fields sit in the same object, in camelCase:
//!
//! ```json
//! {"type":"offer","payload":{"type":"offer","sdp":"v=0..."},"viewerId":"3f2c..."}
//! ```
//!
//! Two enums keep the directions apart: [`ClientMessage`] is what host and
//! viewer pages send, [`ServerMessage`] is what the relay sends back.  Payload
//! fields are [`SignalPayload`]s and are never interpreted here.

use serde::{Deserialize, Serialize};

use crate::domain::ids::{ConnectionId, SignalPayload};

/// Wire names of every [`ClientMessage`] variant.
pub const CLIENT_MESSAGE_NAMES: [&str; 9] = [
    "register-host",
    "register-viewer",
    "request-stream",
    "host-started-sharing",
    "stop-sharing",
    "offer",
    "answer",
    "ice-candidate",
    "request-quality-reduction",
];

/// Messages sent by a host or viewer page to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Register this connection as the host.
    RegisterHost,

    /// Register this connection as a viewer.
    RegisterViewer,

    /// A viewer asks to join (or rejoin) the current broadcast.
    RequestStream,

    /// The host started capturing; every viewer needs a fresh offer.
    HostStartedSharing,

    /// The host stopped capturing.
    StopSharing,

    /// The host's session offer.
    Offer {
        payload: SignalPayload,
        /// Target viewer.  Absent means "every connected viewer".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ConnectionId>,
    },

    /// A viewer's answer to the host's offer.
    Answer {
        payload: SignalPayload,
        /// Echo of the id the viewer was addressed with.  The relay always
        /// tags the forwarded answer with the sender's own connection id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<ConnectionId>,
    },

    /// A network-path candidate.
    IceCandidate {
        candidate: SignalPayload,
        /// Target viewer when sent by the host.  Ignored for viewers, whose
        /// candidates always go to the host.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ConnectionId>,
    },

    /// A viewer asks the host to lower capture quality.
    RequestQualityReduction,
}

impl ClientMessage {
    /// Returns the wire name of the message.
    ///
    /// Used in log lines instead of `{:?}` so payloads never reach the logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::RegisterHost => "register-host",
            ClientMessage::RegisterViewer => "register-viewer",
            ClientMessage::RequestStream => "request-stream",
            ClientMessage::HostStartedSharing => "host-started-sharing",
            ClientMessage::StopSharing => "stop-sharing",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
            ClientMessage::RequestQualityReduction => "request-quality-reduction",
        }
    }
}

/// Messages sent by the relay to a host or viewer page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection: the identifier the relay assigned.
    Welcome { connection_id: ConnectionId },

    /// Host registration rejected: another host is already registered.
    HostExists,

    /// The host's offer, delivered to one viewer.
    Offer {
        payload: SignalPayload,
        /// The receiving viewer's own id, so it can tag its answer.
        viewer_id: ConnectionId,
    },

    /// A viewer's answer, delivered to the host.
    Answer {
        payload: SignalPayload,
        viewer_id: ConnectionId,
    },

    /// A relayed candidate and the connection it came from.
    IceCandidate {
        candidate: SignalPayload,
        from_id: ConnectionId,
    },

    /// Tells the host to produce (or resend) an offer for this viewer.
    NewViewer { viewer_id: ConnectionId },

    /// Tells the host a viewer left.
    ViewerDisconnected { viewer_id: ConnectionId },

    /// Tells a viewer there is no host (it left, or never registered).
    HostDisconnected,

    /// Tells a viewer the host stopped sharing.
    HostStoppedSharing,

    /// Tells a viewer its handshake retry budget ran out.
    SuggestRefresh,

    /// Forwards a viewer's quality-reduction request to the host.
    ViewerRequestsQualityReduction { viewer_id: ConnectionId },

    /// A frame from this connection could not be understood.
    Error { message: String },
}

impl ServerMessage {
    /// Returns the wire name of the message.
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::HostExists => "host-exists",
            ServerMessage::Offer { .. } => "offer",
            ServerMessage::Answer { .. } => "answer",
            ServerMessage::IceCandidate { .. } => "ice-candidate",
            ServerMessage::NewViewer { .. } => "new-viewer",
            ServerMessage::ViewerDisconnected { .. } => "viewer-disconnected",
            ServerMessage::HostDisconnected => "host-disconnected",
            ServerMessage::HostStoppedSharing => "host-stopped-sharing",
            ServerMessage::SuggestRefresh => "suggest-refresh",
            ServerMessage::ViewerRequestsQualityReduction { .. } => {
                "viewer-requests-quality-reduction"
            }
            ServerMessage::Error { .. } => "error",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
