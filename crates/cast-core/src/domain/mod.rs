//! Domain entities for the signaling relay.
//!
//! Everything here is plain data plus the rules that keep it consistent.  No
//! I/O, no timers, no async: the relay's infrastructure layer owns a single
//! [`registry::SessionRegistry`] and feeds it one event at a time.

/// Opaque identifier and payload newtypes.
pub mod ids;

/// The host/viewer session registry and broadcast state.
///
/// See [`registry::SessionRegistry`] for the main type.
pub mod registry;
