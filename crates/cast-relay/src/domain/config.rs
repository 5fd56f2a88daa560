//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for runtime settings.  It is
//! built once in `main.rs` from CLI arguments, environment variables and the
//! optional TOML file, then handed to the server by value.

use std::net::SocketAddr;

use cast_core::RetryPolicy;

/// Default WebSocket listener port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default capacity of each connection's outbound frame queue.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Default capacity of the hub's command queue.
pub const DEFAULT_HUB_QUEUE: usize = 1024;

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use cast_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// assert_eq!(cfg.retry.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The address and port the WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// Re-prompt policy for viewers whose handshake stalls.
    pub retry: RetryPolicy,

    /// Frames queued per connection before further frames to it are dropped.
    ///
    /// Signaling is fire-and-forget; a viewer that cannot keep up loses
    /// messages rather than stalling the hub.
    pub outbound_queue: usize,

    /// Commands queued for the hub task before connection readers wait.
    pub hub_queue: usize,
}

impl Default for RelayConfig {
    /// | Field          | Default        |
    /// |----------------|----------------|
    /// | bind_addr      | `0.0.0.0:3000` |
    /// | retry          | 3 s, 3 retries |
    /// | outbound_queue | 256            |
    /// | hub_queue      | 1024           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            retry: RetryPolicy::default(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            hub_queue: DEFAULT_HUB_QUEUE,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
