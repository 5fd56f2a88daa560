//! The hub task: single owner of the signaling state and the retry timers.
//!
//! Connection tasks never touch the registry.  They send [`HubCommand`]s
//! through a [`HubHandle`], and one Tokio task applies them in arrival order:
//!
//! ```text
//! conn task ──┐
//! conn task ──┼──► mpsc<HubCommand> ──► hub task ──► SignalingHub::handle
//! timer task ─┘                            │
//!                                          ├──► Outbox (per-connection queues)
//!                                          └──► retry timers (spawn / abort)
//! ```
//!
//! Retry timers are plain Tokio tasks keyed by viewer id.  A timer holds only
//! a weak sender into the hub queue, so the hub shuts down once every
//! [`HubHandle`] is gone, even with timers still armed.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info};

use cast_core::{ClientMessage, ConnectionId, RetryPolicy, ServerMessage};

use crate::application::{Effect, RelayEvent, SignalingHub};
use crate::infrastructure::outbox::{Outbox, PeerDirectory};

/// Errors returned by [`HubHandle`] operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The hub task has exited; nothing more can be relayed.
    #[error("signaling hub has shut down")]
    HubClosed,
}

/// Commands accepted by the hub task.
#[derive(Debug)]
pub enum HubCommand {
    /// A connection finished its handshake and can receive frames.
    Attach {
        id: ConnectionId,
        outbound: mpsc::Sender<String>,
    },

    /// Something for the signaling state machine.
    Event(RelayEvent),

    /// Report a snapshot of the current state.
    Inspect(oneshot::Sender<HubSnapshot>),
}

/// Point-in-time view of the hub, for diagnostics and tests.
///
/// Identifier lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSnapshot {
    pub host: Option<ConnectionId>,
    pub is_sharing: bool,
    pub viewers: Vec<ConnectionId>,
    pub pending_retries: Vec<ConnectionId>,
    pub active_timers: usize,
}

/// Cloneable sender side of the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Registers a connection's outbound queue.  The hub greets it with
    /// `welcome`.
    pub async fn attach(
        &self,
        id: ConnectionId,
        outbound: mpsc::Sender<String>,
    ) -> Result<(), RelayError> {
        self.send(HubCommand::Attach { id, outbound }).await
    }

    /// Hands a decoded client frame to the hub.
    pub async fn inbound(
        &self,
        from: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), RelayError> {
        self.send(HubCommand::Event(RelayEvent::Inbound { from, message }))
            .await
    }

    /// Reports that a connection closed.
    pub async fn disconnected(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.send(HubCommand::Event(RelayEvent::Disconnected { id }))
            .await
    }

    /// Returns a snapshot taken after every previously sent command was
    /// applied.
    pub async fn snapshot(&self) -> Result<HubSnapshot, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Inspect(reply_tx)).await?;
        reply_rx.await.map_err(|_| RelayError::HubClosed)
    }

    async fn send(&self, command: HubCommand) -> Result<(), RelayError> {
        self.tx.send(command).await.map_err(|_| RelayError::HubClosed)
    }
}

/// Spawns the hub with the production [`PeerDirectory`] outbox.
pub fn spawn_hub(policy: RetryPolicy, capacity: usize) -> (HubHandle, JoinHandle<()>) {
    spawn_hub_with(PeerDirectory::new(), policy, capacity)
}

/// Spawns the hub with a caller-supplied outbox.
///
/// The returned task ends when every [`HubHandle`] clone has been dropped.
pub fn spawn_hub_with<O>(
    outbox: O,
    policy: RetryPolicy,
    capacity: usize,
) -> (HubHandle, JoinHandle<()>)
where
    O: Outbox + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = HubTask {
        signaling: SignalingHub::new(policy),
        outbox,
        timers: HashMap::new(),
        ticks: tx.downgrade(),
    };
    let join = tokio::spawn(task.run(rx));
    (HubHandle { tx }, join)
}

// ── Hub task ──────────────────────────────────────────────────────────────────

struct HubTask<O> {
    signaling: SignalingHub,
    outbox: O,
    timers: HashMap<ConnectionId, JoinHandle<()>>,
    ticks: mpsc::WeakSender<HubCommand>,
}

impl<O: Outbox> HubTask<O> {
    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        info!(
            retry_interval_ms = duration_ms(self.signaling.policy().interval),
            max_retries = self.signaling.policy().max_retries,
            "signaling hub started"
        );

        while let Some(command) = rx.recv().await {
            match command {
                HubCommand::Attach { id, outbound } => {
                    self.outbox.attach(id.clone(), outbound);
                    self.outbox.deliver(
                        &id,
                        &ServerMessage::Welcome {
                            connection_id: id.clone(),
                        },
                    );
                }
                HubCommand::Event(event) => {
                    if let RelayEvent::Disconnected { id } = &event {
                        self.outbox.detach(id);
                    }
                    let effects = self.signaling.handle(event);
                    self.execute(effects);
                }
                HubCommand::Inspect(reply) => {
                    // The requester may have given up; nothing to do then.
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        info!("signaling hub stopped");
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => {
                    self.outbox.deliver(&to, &message);
                }
                Effect::ArmRetry { viewer, epoch } => self.arm_timer(viewer, epoch),
                Effect::CancelRetry { viewer } => {
                    if let Some(timer) = self.timers.remove(&viewer) {
                        timer.abort();
                        debug!(viewer = %viewer, "retry timer cancelled");
                    }
                }
            }
        }
    }

    fn arm_timer(&mut self, viewer: ConnectionId, epoch: u64) {
        let period = self.signaling.policy().interval;
        let ticks = self.ticks.clone();
        let tick_viewer = viewer.clone();
        let first_tick = Instant::now() + period;

        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            loop {
                ticker.tick().await;
                let Some(tx) = ticks.upgrade() else { break };
                let tick = RelayEvent::RetryTick {
                    viewer: tick_viewer.clone(),
                    epoch,
                };
                if tx.send(HubCommand::Event(tick)).await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.timers.insert(viewer.clone(), timer) {
            previous.abort();
        }
        debug!(viewer = %viewer, epoch, period_ms = duration_ms(period), "retry timer armed");
    }

    fn snapshot(&self) -> HubSnapshot {
        let registry = self.signaling.registry();
        let mut viewers: Vec<ConnectionId> = registry.viewers().map(|v| v.id.clone()).collect();
        viewers.sort();
        let mut pending_retries: Vec<ConnectionId> = registry
            .viewers()
            .filter(|v| v.pending_retry.is_some())
            .map(|v| v.id.clone())
            .collect();
        pending_retries.sort();

        HubSnapshot {
            host: registry.host().map(|h| h.id.clone()),
            is_sharing: registry.is_sharing(),
            viewers,
            pending_retries,
            active_timers: self.timers.len(),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::outbox::MockOutbox;
    use mockall::predicate::eq;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::new(s)
    }

    #[tokio::test]
    async fn test_attach_greets_connection_with_welcome() {
        // Arrange
        let mut outbox = MockOutbox::new();
        outbox
            .expect_attach()
            .withf(|conn, _| conn.as_str() == "c1")
            .times(1)
            .return_const(());
        outbox
            .expect_deliver()
            .withf(|to, msg| {
                to.as_str() == "c1"
                    && matches!(msg, ServerMessage::Welcome { connection_id } if connection_id.as_str() == "c1")
            })
            .times(1)
            .return_const(true);
        let (handle, join) = spawn_hub_with(outbox, RetryPolicy::default(), 8);
        let (tx, _rx) = mpsc::channel(4);

        // Act
        handle.attach(id("c1"), tx).await.unwrap();
        handle.snapshot().await.unwrap();
        drop(handle);

        // Assert: mock expectations are checked when the hub drops the outbox
        assert!(join.await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_detaches_before_handling() {
        // Arrange
        let mut outbox = MockOutbox::new();
        outbox
            .expect_detach()
            .with(eq(ConnectionId::new("c1")))
            .times(1)
            .return_const(());
        outbox.expect_deliver().times(0);
        let (handle, join) = spawn_hub_with(outbox, RetryPolicy::default(), 8);

        // Act
        handle.disconnected(id("c1")).await.unwrap();
        handle.snapshot().await.unwrap();
        drop(handle);

        // Assert
        assert!(join.await.is_ok());
    }

    #[tokio::test]
    async fn test_second_host_gets_host_exists() {
        // Arrange
        let mut outbox = MockOutbox::new();
        outbox
            .expect_deliver()
            .with(eq(ConnectionId::new("h2")), eq(ServerMessage::HostExists))
            .times(1)
            .return_const(true);
        let (handle, join) = spawn_hub_with(outbox, RetryPolicy::default(), 8);

        // Act
        handle.inbound(id("h1"), ClientMessage::RegisterHost).await.unwrap();
        handle.inbound(id("h2"), ClientMessage::RegisterHost).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        drop(handle);

        // Assert
        assert_eq!(snapshot.host, Some(id("h1")));
        assert!(join.await.is_ok());
    }

    #[tokio::test]
    async fn test_stream_request_arms_one_timer() {
        // Arrange
        let mut outbox = MockOutbox::new();
        outbox.expect_deliver().return_const(true);
        let (handle, _join) = spawn_hub_with(outbox, RetryPolicy::default(), 8);
        handle.inbound(id("h"), ClientMessage::RegisterHost).await.unwrap();
        handle.inbound(id("h"), ClientMessage::HostStartedSharing).await.unwrap();
        handle.inbound(id("v"), ClientMessage::RegisterViewer).await.unwrap();

        // Act: requesting twice replaces the timer
        handle.inbound(id("v"), ClientMessage::RequestStream).await.unwrap();
        handle.inbound(id("v"), ClientMessage::RequestStream).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();

        // Assert
        assert_eq!(snapshot.active_timers, 1);
        assert_eq!(snapshot.pending_retries, vec![id("v")]);
    }

    #[tokio::test]
    async fn test_stop_sharing_cancels_timers() {
        let mut outbox = MockOutbox::new();
        outbox.expect_deliver().return_const(true);
        let (handle, _join) = spawn_hub_with(outbox, RetryPolicy::default(), 8);
        handle.inbound(id("h"), ClientMessage::RegisterHost).await.unwrap();
        handle.inbound(id("h"), ClientMessage::HostStartedSharing).await.unwrap();
        handle.inbound(id("v"), ClientMessage::RegisterViewer).await.unwrap();
        handle.inbound(id("v"), ClientMessage::RequestStream).await.unwrap();

        handle.inbound(id("h"), ClientMessage::StopSharing).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();

        assert_eq!(snapshot.active_timers, 0);
        assert!(snapshot.pending_retries.is_empty());
        assert!(!snapshot.is_sharing);
    }

    #[tokio::test]
    async fn test_handle_reports_closed_hub() {
        let (handle, join) = spawn_hub(RetryPolicy::default(), 8);
        join.abort();
        let _ = join.await;

        let result = handle.disconnected(id("x")).await;

        assert!(matches!(result, Err(RelayError::HubClosed)));
    }
}
