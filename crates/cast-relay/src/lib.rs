//! cast-relay library crate.
//!
//! The signaling relay for a single-host, multi-viewer screen share.  It
//! brokers the offer / answer / candidate handshake between the host page and
//! each viewer page and tracks the broadcast lifecycle.  Media never passes
//! through it.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Host page / viewer pages (JSON over WebSocket)
//!         ↕
//! [cast-relay]
//!   ├── domain/           RelayConfig
//!   ├── application/      Signaling router, lifecycle controller, dispatch
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         ├── hub/        Single owner task for the registry + retry timers
//!         ├── outbox/     Per-connection outbound queues
//!         └── storage/    Optional TOML config file
//! ```
//!
//! # Layer rules
//!
//! - `domain` and `application` do no I/O and spawn nothing.  Application
//!   handlers return [`application::Effect`]s describing what should happen.
//! - `infrastructure` executes those effects: it writes frames and owns the
//!   timers.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: signaling state transitions.
pub mod application;

/// Infrastructure layer: WebSocket server, hub task, config file.
pub mod infrastructure;
