//! Infrastructure layer for cast-relay.
//!
//! Everything that performs I/O or owns a task lives here.
//!
//! # Responsibilities
//!
//! - Binding the TCP listener and upgrading connections to WebSocket
//! - Decoding inbound frames and queueing outbound ones per connection
//! - Running the hub task that serializes all signaling state changes
//! - Spawning and aborting the per-viewer retry timers
//! - Reading the optional TOML config file
//!
//! # What does NOT belong here?
//!
//! - Routing and lifecycle decisions (that is the application layer)
//! - Wire message definitions (that is `cast-core`)

pub mod hub;
pub mod outbox;
pub mod storage;
pub mod ws_server;

pub use hub::{spawn_hub, HubHandle, HubSnapshot, RelayError};
pub use ws_server::{run_server, RelayServer};
