//! Events consumed and effects produced by the signaling handlers.

use cast_core::{ClientMessage, ConnectionId, ServerMessage};

/// Something that happened on the transport, in the order the hub saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A decoded frame from a connection.
    Inbound {
        from: ConnectionId,
        message: ClientMessage,
    },

    /// The connection closed (cleanly or not).
    Disconnected { id: ConnectionId },

    /// A viewer's retry timer fired.  `epoch` identifies the timer instance.
    RetryTick { viewer: ConnectionId, epoch: u64 },
}

/// Work the infrastructure must perform after a handler ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `message` to connection `to`, best-effort.
    Send {
        to: ConnectionId,
        message: ServerMessage,
    },

    /// Start a periodic retry timer for `viewer`, replacing any running one.
    ArmRetry { viewer: ConnectionId, epoch: u64 },

    /// Stop the retry timer for `viewer`, if one is running.
    CancelRetry { viewer: ConnectionId },
}

impl Effect {
    pub fn send(to: &ConnectionId, message: ServerMessage) -> Self {
        Effect::Send {
            to: to.clone(),
            message,
        }
    }
}
