//! WebSocket server: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Spawning the hub task that owns all signaling state.
//! 3. Upgrading each accepted connection to a WebSocket session and giving it
//!    a fresh [`ConnectionId`].
//! 4. Running one task per connection that decodes inbound text frames for the
//!    hub and writes the hub's outbound frames back to the socket.
//! 5. Reporting every close, clean or not, to the hub exactly once.
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! A frame that fails to decode is answered on the same socket with an
//! `error` message and otherwise ignored; the connection stays open.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use cast_core::{
    decode_client_message, encode_server_message, ClientMessage, ConnectionId, ServerMessage,
};

use crate::domain::config::RelayConfig;
use crate::infrastructure::hub::{spawn_hub, HubHandle};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound relay, ready to run.
///
/// Binding and running are separate steps so callers (and tests) can learn
/// the actual port when binding to port 0.
pub struct RelayServer {
    listener: TcpListener,
    config: RelayConfig,
}

impl RelayServer {
    /// Binds the listener on `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;
        Ok(Self { listener, config })
    }

    /// The address the listener is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Connections already open keep being served by their own tasks after
    /// this returns; the hub exits once the last of them closes.
    ///
    /// # Errors
    ///
    /// Currently never fails once bound; accept errors are logged and the loop
    /// continues.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        let (hub, _hub_task) = spawn_hub(self.config.retry, self.config.hub_queue);
        info!("signaling relay listening on ws://{addr}");

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new TCP connection from {peer_addr}");
                    let hub = hub.clone();
                    let outbound_queue = self.config.outbound_queue;
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, hub, outbound_queue).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {
                    // Poll timeout; loop back to check the flag.
                }
            }
        }

        Ok(())
    }
}

/// Binds on `config.bind_addr` and serves until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    RelayServer::bind(config).await?.run(running).await
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
    outbound_queue: usize,
) {
    match run_connection(raw_stream, peer_addr, hub, outbound_queue).await {
        Ok(()) => debug!("connection {peer_addr} closed normally"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
    outbound_queue: usize,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let id = ConnectionId::generate();
    info!(connection = %id, peer = %peer_addr, "connection established");

    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(outbound_queue);
    hub.attach(id.clone(), outbound_tx)
        .await
        .context("hub unavailable")?;

    let (ws_tx, ws_rx) = ws_stream.split();
    let result = pump(&id, &hub, ws_tx, ws_rx, outbound_rx).await;

    // Report the close even when the pump failed.
    if let Err(e) = hub.disconnected(id.clone()).await {
        debug!(connection = %id, "could not report disconnect: {e}");
    }
    info!(connection = %id, "connection closed");
    result
}

/// Moves frames in both directions until either side goes away.
async fn pump(
    id: &ConnectionId,
    hub: &HubHandle,
    mut ws_tx: WsSink,
    mut ws_rx: WsSource,
    mut outbound_rx: mpsc::Receiver<String>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(frame) = outbound else {
                    // The hub dropped our queue: it is shutting down.
                    break;
                };
                ws_tx
                    .send(WsMessage::Text(frame))
                    .await
                    .context("failed to write frame")?;
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => match decode_or_reject(&text) {
                        Ok(message) => hub.inbound(id.clone(), message).await?,
                        Err(reply) => send_direct(&mut ws_tx, &reply).await?,
                    },
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!(connection = %id, "ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        ws_tx
                            .send(WsMessage::Pong(data))
                            .await
                            .context("failed to answer ping")?;
                    }
                    Some(Ok(WsMessage::Pong(_))) | Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break,
                    Some(Err(e)) => return Err(e).context("WebSocket read error"),
                }
            }
        }
    }
    Ok(())
}

/// Decodes a text frame, or builds the `error` reply for the sender.
fn decode_or_reject(text: &str) -> Result<ClientMessage, ServerMessage> {
    decode_client_message(text).map_err(|e| {
        warn!("rejecting frame: {e}");
        ServerMessage::Error {
            message: e.to_string(),
        }
    })
}

async fn send_direct(ws_tx: &mut WsSink, message: &ServerMessage) -> anyhow::Result<()> {
    let frame = encode_server_message(message)?;
    ws_tx
        .send(WsMessage::Text(frame))
        .await
        .context("failed to write frame")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
