//! Outbound delivery: one bounded frame queue per connection.
//!
//! The hub never writes to a socket itself.  Each connection task hands the
//! hub the sending half of its queue when it attaches, and the hub pushes
//! encoded frames into it with `try_send`.  A slow or dead peer therefore
//! loses frames instead of stalling every other connection.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use cast_core::{encode_server_message, ConnectionId, ServerMessage};

/// Where the hub delivers server messages.
///
/// The production implementation is [`PeerDirectory`]; tests substitute a
/// mock to observe exactly what the hub sends.
#[cfg_attr(test, mockall::automock)]
pub trait Outbox: Send {
    /// Makes `id` reachable through `outbound`.
    fn attach(&mut self, id: ConnectionId, outbound: mpsc::Sender<String>);

    /// Forgets `id`.  Later deliveries to it are dropped.
    fn detach(&mut self, id: &ConnectionId);

    /// Delivers one message, best-effort.  Returns `true` if it was queued.
    fn deliver(&mut self, to: &ConnectionId, message: &ServerMessage) -> bool;
}

/// Connection id → outbound queue.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: HashMap<ConnectionId, mpsc::Sender<String>>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Outbox for PeerDirectory {
    fn attach(&mut self, id: ConnectionId, outbound: mpsc::Sender<String>) {
        self.peers.insert(id, outbound);
    }

    fn detach(&mut self, id: &ConnectionId) {
        self.peers.remove(id);
    }

    fn deliver(&mut self, to: &ConnectionId, message: &ServerMessage) -> bool {
        let Some(outbound) = self.peers.get(to) else {
            debug!(to = %to, message = message.name(), "dropping message for unknown connection");
            return false;
        };

        let frame = match encode_server_message(message) {
            Ok(frame) => frame,
            Err(e) => {
                error!(to = %to, "failed to encode outbound message: {e}");
                return false;
            }
        };

        match outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(to = %to, message = message.name(), "outbound queue full; dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(to = %to, message = message.name(), "connection closing; dropping message");
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
