//! Screencast signaling relay: entry point.
//!
//! Accepts WebSocket connections from one host page and any number of viewer
//! pages and relays the peer-connection handshake between them.  Media flows
//! directly between the browsers; this process only sees signaling JSON.
//!
//! Static page serving and TLS termination are left to a reverse proxy in
//! front of the relay.
//!
//! # Usage
//!
//! ```text
//! cast-relay [OPTIONS]
//!
//! Options:
//!   --port <PORT>              WebSocket listener port [default: 3000]
//!   --bind <ADDR>              IP address to bind [default: 0.0.0.0]
//!   --retry-interval <SECS>    Seconds between offer re-prompts [default: 3]
//!   --max-retries <N>          Re-prompts before suggesting a refresh [default: 3]
//!   --config <PATH>            Optional TOML config file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag               |
//! |-----------------------|--------------------|
//! | `PORT`                | `--port`           |
//! | `CAST_BIND`           | `--bind`           |
//! | `CAST_RETRY_INTERVAL` | `--retry-interval` |
//! | `CAST_MAX_RETRIES`    | `--max-retries`    |
//! | `CAST_CONFIG`         | `--config`         |
//!
//! Precedence is flag, then environment, then config file, then the built-in
//! default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cast_core::RetryPolicy;
use cast_relay::domain::RelayConfig;
use cast_relay::infrastructure::run_server;
use cast_relay::infrastructure::storage::config::{load_config, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket signaling relay for single-host, multi-viewer screen sharing.
///
/// Every option is optional; unset options fall back to the config file and
/// then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "cast-relay",
    about = "WebSocket signaling relay for single-host, multi-viewer screen sharing",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// IP address to bind.  `0.0.0.0` accepts connections on every interface.
    #[arg(long, env = "CAST_BIND")]
    bind: Option<String>,

    /// Seconds between re-prompts to the host while a viewer's handshake is
    /// pending.
    #[arg(long, env = "CAST_RETRY_INTERVAL")]
    retry_interval: Option<u64>,

    /// Re-prompts sent before the viewer is told to refresh.
    #[arg(long, env = "CAST_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Path to a TOML config file.
    #[arg(long, env = "CAST_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merges the CLI arguments over `file` into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not a valid IP address, or if
    /// the retry interval or a queue size is zero.
    fn into_relay_config(self, file: &FileConfig) -> anyhow::Result<RelayConfig> {
        let bind = self.bind.unwrap_or_else(|| file.server.bind_address.clone());
        let port = self.port.unwrap_or(file.server.port);
        let bind_addr: SocketAddr = format!("{bind}:{port}")
            .parse()
            .with_context(|| format!("invalid bind address: '{bind}:{port}'"))?;

        let interval_secs = self.retry_interval.unwrap_or(file.retry.interval_secs);
        ensure!(interval_secs > 0, "retry interval must be at least one second");

        ensure!(file.queues.outbound > 0, "outbound queue size must be non-zero");
        ensure!(file.queues.hub > 0, "hub queue size must be non-zero");

        Ok(RelayConfig {
            bind_addr,
            retry: RetryPolicy {
                interval: Duration::from_secs(interval_secs),
                max_retries: self.max_retries.unwrap_or(file.retry.max_retries),
            },
            outbound_queue: file.queues.outbound,
            hub_queue: file.queues.hub,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => FileConfig::default(),
    };

    // RUST_LOG wins over the file's log_level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file_config.log_level)),
        )
        .init();

    let config = cli.into_relay_config(&file_config)?;
    info!(
        "screencast relay starting: bind={}, retry={}s x{}",
        config.bind_addr,
        config.retry.interval.as_secs(),
        config.retry.max_retries
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("screencast relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
