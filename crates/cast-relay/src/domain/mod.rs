//! Domain layer for cast-relay.
//!
//! Only configuration lives here; the session registry and wire types are
//! shared through `cast-core`.

pub mod config;

pub use config::RelayConfig;
