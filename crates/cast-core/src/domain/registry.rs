//! SessionRegistry: the single host, the viewer set, and the broadcast state.
//!
//! The registry is the relay's in-memory database for one process lifetime.
//! It tracks:
//!
//! - At most one [`HostState`]: the connection currently publishing.
//! - Any number of [`ViewerState`]s keyed by [`ConnectionId`].
//! - The broadcast state: the host's latest offer (`host_stream`) and whether
//!   sharing is active (`is_sharing`).
//!
//! # Handshake state per viewer
//!
//! Each viewer moves through one offer cycle at a time:
//!
//! ```text
//! AWAITING_OFFER ──► OFFER_SENT (has_answered = false) ──► ANSWERED (has_answered = true)
//!                         ▲                                      │
//!                         └──────── new offer cycle ─────────────┘
//! ```
//!
//! Any new cycle (re-offer, start-sharing, stream request) goes back to
//! `OFFER_SENT` through [`ViewerState::reset_handshake`].  Disconnect removes
//! the record from any state.
//!
//! # Retry bookkeeping
//!
//! A viewer waiting for the host's offer may carry a [`PendingRetry`].  Every
//! arm call hands out a fresh epoch; timer ticks quote the epoch they were
//! armed with so ticks from a replaced or removed record are recognisable as
//! stale.  The timers themselves live in the relay's infrastructure layer.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::domain::ids::{ConnectionId, SignalPayload};

/// Default spacing between "produce an offer for this viewer" re-prompts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of re-prompts before the viewer is told to refresh.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// A second connection tried to become the host.
    #[error("a host is already registered ({existing})")]
    HostAlreadyRegistered { existing: ConnectionId },
}

/// How a stalled viewer handshake is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Time between ticks of the retry timer.
    pub interval: Duration,
    /// Re-prompts sent to the host before giving up on the viewer.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// An armed retry timer for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRetry {
    /// Identifies the timer instance; ticks with another epoch are stale.
    pub epoch: u64,
    /// Ticks consumed so far.
    pub attempts: u32,
}

/// The registered host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub id: ConnectionId,
    pub is_connected: bool,
    /// Most recent offer the host sent, if any.
    pub last_stream: Option<SignalPayload>,
}

/// One registered viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub id: ConnectionId,
    pub is_connected: bool,
    /// `true` once this viewer's answer for the current offer cycle has been
    /// forwarded to the host.
    pub has_answered: bool,
    pub last_answer: Option<SignalPayload>,
    pub pending_retry: Option<PendingRetry>,
}

impl ViewerState {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            is_connected: true,
            has_answered: false,
            last_answer: None,
            pending_retry: None,
        }
    }

    /// Starts a new offer cycle for this viewer.
    pub fn reset_handshake(&mut self) {
        self.has_answered = false;
        self.last_answer = None;
    }

    /// Records the accepted answer for the current offer cycle.
    pub fn record_answer(&mut self, answer: SignalPayload) {
        self.has_answered = true;
        self.last_answer = Some(answer);
    }
}

/// In-memory registry of the host, the viewers, and the broadcast state.
///
/// Owned by exactly one task in the relay; callers never share it across
/// threads without serializing access.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    host: Option<HostState>,
    host_stream: Option<SignalPayload>,
    is_sharing: bool,
    viewers: HashMap<ConnectionId, ViewerState>,
    next_epoch: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Host ──────────────────────────────────────────────────────────────────

    /// Registers `id` as the host.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HostAlreadyRegistered`] if any host is already
    /// registered (including `id` itself).  The registry is left untouched.
    pub fn register_host(&mut self, id: ConnectionId) -> Result<(), RegistryError> {
        if let Some(existing) = &self.host {
            return Err(RegistryError::HostAlreadyRegistered {
                existing: existing.id.clone(),
            });
        }
        self.host = Some(HostState {
            id,
            is_connected: true,
            last_stream: None,
        });
        Ok(())
    }

    /// Removes the host and clears the broadcast state with it.
    pub fn remove_host(&mut self) -> Option<HostState> {
        self.host_stream = None;
        self.is_sharing = false;
        self.host.take()
    }

    pub fn is_host(&self, id: &ConnectionId) -> bool {
        self.host.as_ref().is_some_and(|h| &h.id == id)
    }

    pub fn host(&self) -> Option<&HostState> {
        self.host.as_ref()
    }

    /// Returns the host's identifier if a host is registered and connected.
    pub fn connected_host(&self) -> Option<&ConnectionId> {
        self.host
            .as_ref()
            .filter(|h| h.is_connected)
            .map(|h| &h.id)
    }

    // ── Broadcast state ───────────────────────────────────────────────────────

    pub fn host_stream(&self) -> Option<&SignalPayload> {
        self.host_stream.as_ref()
    }

    /// Stores the host's latest offer.
    pub fn set_host_stream(&mut self, offer: SignalPayload) {
        if let Some(host) = self.host.as_mut() {
            host.last_stream = Some(offer.clone());
        }
        self.host_stream = Some(offer);
    }

    pub fn clear_host_stream(&mut self) {
        if let Some(host) = self.host.as_mut() {
            host.last_stream = None;
        }
        self.host_stream = None;
    }

    pub fn is_sharing(&self) -> bool {
        self.is_sharing
    }

    pub fn set_sharing(&mut self, sharing: bool) {
        self.is_sharing = sharing;
    }

    // ── Viewers ───────────────────────────────────────────────────────────────

    /// Registers `id` as a viewer with a fresh record.
    ///
    /// An existing record for the same identifier is discarded (reconnect with
    /// the same id) and returned.
    pub fn register_viewer(&mut self, id: ConnectionId) -> Option<ViewerState> {
        let previous = self.viewers.remove(&id);
        if previous.is_some() {
            debug!(viewer = %id, "replacing existing viewer record");
        }
        self.viewers.insert(id.clone(), ViewerState::new(id));
        previous
    }

    pub fn remove_viewer(&mut self, id: &ConnectionId) -> Option<ViewerState> {
        self.viewers.remove(id)
    }

    pub fn viewer(&self, id: &ConnectionId) -> Option<&ViewerState> {
        self.viewers.get(id)
    }

    pub fn viewer_mut(&mut self, id: &ConnectionId) -> Option<&mut ViewerState> {
        self.viewers.get_mut(id)
    }

    /// Iterates over the current viewer set.  Order is unspecified; call again
    /// to restart.
    pub fn viewers(&self) -> impl Iterator<Item = &ViewerState> + '_ {
        self.viewers.values()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Resets the handshake flags of every connected viewer and returns their
    /// identifiers.
    pub fn reset_connected_viewers(&mut self) -> Vec<ConnectionId> {
        self.viewers
            .values_mut()
            .filter(|v| v.is_connected)
            .map(|v| {
                v.reset_handshake();
                v.id.clone()
            })
            .collect()
    }

    // ── Retry bookkeeping ─────────────────────────────────────────────────────

    /// Arms a retry for `viewer`, replacing any pending one.
    ///
    /// Returns the new epoch, or `None` if the viewer is not registered.
    pub fn arm_retry(&mut self, viewer: &ConnectionId) -> Option<u64> {
        let state = self.viewers.get_mut(viewer)?;
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        state.pending_retry = Some(PendingRetry { epoch, attempts: 0 });
        Some(epoch)
    }

    /// Clears the pending retry for `viewer`, returning it if there was one.
    pub fn disarm_retry(&mut self, viewer: &ConnectionId) -> Option<PendingRetry> {
        self.viewers.get_mut(viewer)?.pending_retry.take()
    }

    /// Clears every pending retry and returns the affected viewer identifiers.
    pub fn disarm_all_retries(&mut self) -> Vec<ConnectionId> {
        self.viewers
            .values_mut()
            .filter_map(|v| v.pending_retry.take().map(|_| v.id.clone()))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
