//! Application layer for cast-relay.
//!
//! Every handler here takes the [`SessionRegistry`](cast_core::SessionRegistry)
//! plus one inbound event, applies the state transition through the
//! registry's API, and returns the [`Effect`]s the infrastructure must carry
//! out.  Nothing here sends a frame or starts a timer itself, so every
//! scenario can be replayed deterministically in tests.
//!
//! # Sub-modules
//!
//! - **`effects`** – The event and effect vocabulary shared by all handlers.
//! - **`signaling_router`** – Forwards offers, answers, candidates and
//!   quality requests to the right counterpart.
//! - **`lifecycle`** – Start/stop sharing, stream requests, disconnects and
//!   the bounded offer-retry loop.
//! - **`dispatch`** – [`SignalingHub`]: maps each message name to its handler.

pub mod dispatch;
pub mod effects;
pub mod lifecycle;
pub mod signaling_router;

pub use dispatch::SignalingHub;
pub use effects::{Effect, RelayEvent};
