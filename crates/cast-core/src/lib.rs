//! # cast-core
//!
//! Shared library for the screencast signaling relay: connection identifiers,
//! the JSON wire protocol spoken by host and viewer pages, and the in-memory
//! session registry that tracks who is hosting and who is watching.
//!
//! This crate has no dependencies on sockets, timers or async runtimes.  The
//! relay binary (`cast-relay`) drives it from a single owner task.
//!
//! # Architecture overview
//!
//! One **host** publishes a screen capture; any number of **viewers**
//! subscribe.  Media flows peer-to-peer; the relay only brokers the
//! offer / answer / candidate handshake between the host and each viewer.
//!
//! - **`protocol`** – The messages exchanged over each WebSocket connection
//!   and the JSON codec for them.
//!
//! - **`domain`** – Identifier newtypes and the [`SessionRegistry`]: the
//!   single host, the viewer set, and the broadcast state.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cast_core::SessionRegistry` instead of `cast_core::domain::registry::SessionRegistry`.
pub use domain::ids::{ConnectionId, SignalPayload};
pub use domain::registry::{
    HostState, PendingRetry, RegistryError, RetryPolicy, SessionRegistry, ViewerState,
};
pub use protocol::codec::{decode_client_message, encode_server_message, ProtocolError};
pub use protocol::messages::{ClientMessage, ServerMessage};
