//! Lifecycle controller: sharing transitions, stream requests, disconnects,
//! and the bounded offer-retry loop.
//!
//! # Offer retry
//!
//! When a viewer asks for the stream (or the host starts sharing while the
//! viewer is watching), the host is told `new-viewer` and a retry timer is
//! armed for that viewer.  On every tick the viewer's current state is
//! re-read:
//!
//! ```text
//! tick ──► viewer gone or answered?  ──yes──► cancel
//!            │ no
//!            ▼
//!          attempts += 1
//!          attempts <= max, sharing, host connected? ──yes──► new-viewer to host
//!            │ no
//!            ▼
//!          cancel + suggest-refresh to the viewer
//! ```
//!
//! With the default policy (3 s, 3 retries) the host is prompted at 0, 3, 6
//! and 9 seconds and the viewer is told to refresh at 12 seconds.

use cast_core::{ConnectionId, ServerMessage, SessionRegistry};
use tracing::{debug, info, warn};

use crate::application::effects::Effect;

/// The host started sharing: every connected viewer begins a new offer cycle.
///
/// The host receives one `new-viewer` per connected viewer (the same path a
/// genuinely new viewer takes) and each viewer gets a retry timer.
pub fn on_host_start_sharing(registry: &mut SessionRegistry) -> Vec<Effect> {
    registry.set_sharing(true);

    let Some(host_id) = registry.connected_host().cloned() else {
        return Vec::new();
    };

    let viewers = registry.reset_connected_viewers();
    info!(host = %host_id, viewers = viewers.len(), "host started sharing");

    let mut effects = Vec::with_capacity(viewers.len() * 2);
    for viewer_id in viewers {
        effects.push(Effect::send(
            &host_id,
            ServerMessage::NewViewer {
                viewer_id: viewer_id.clone(),
            },
        ));
        if let Some(epoch) = registry.arm_retry(&viewer_id) {
            effects.push(Effect::ArmRetry {
                viewer: viewer_id,
                epoch,
            });
        }
    }
    effects
}

/// The host stopped sharing: the offer is discarded, pending retries end, and
/// every connected viewer is told.
pub fn on_host_stop_sharing(registry: &mut SessionRegistry) -> Vec<Effect> {
    registry.set_sharing(false);
    registry.clear_host_stream();

    let mut effects: Vec<Effect> = registry
        .disarm_all_retries()
        .into_iter()
        .map(|viewer| Effect::CancelRetry { viewer })
        .collect();

    let viewers = registry.reset_connected_viewers();
    info!(viewers = viewers.len(), "host stopped sharing");
    effects.extend(
        viewers
            .iter()
            .map(|viewer_id| Effect::send(viewer_id, ServerMessage::HostStoppedSharing)),
    );
    effects
}

/// A viewer asks to join the current broadcast.
pub fn on_stream_request(registry: &mut SessionRegistry, viewer_id: &ConnectionId) -> Vec<Effect> {
    if registry.viewer(viewer_id).is_none() {
        debug!(connection = %viewer_id, "dropping stream request from unregistered connection");
        return Vec::new();
    }

    let Some(host_id) = registry.connected_host().cloned() else {
        debug!(viewer = %viewer_id, "stream requested but no host is connected");
        return vec![Effect::send(viewer_id, ServerMessage::HostDisconnected)];
    };

    let sharing = registry.is_sharing();
    if let Some(viewer) = registry.viewer_mut(viewer_id) {
        viewer.is_connected = true;
        if !sharing {
            // Nothing to negotiate yet; start-sharing will reach this viewer.
            debug!(viewer = %viewer_id, "stream requested before sharing started; waiting");
            return Vec::new();
        }
        viewer.reset_handshake();
    }

    let mut effects = vec![Effect::send(
        &host_id,
        ServerMessage::NewViewer {
            viewer_id: viewer_id.clone(),
        },
    )];
    if let Some(epoch) = registry.arm_retry(viewer_id) {
        effects.push(Effect::ArmRetry {
            viewer: viewer_id.clone(),
            epoch,
        });
    }
    debug!(viewer = %viewer_id, "asked host for an offer");
    effects
}

/// A connection closed.
///
/// Host: the broadcast ends, every connected viewer is told and goes back to
/// waiting (viewers stay registered for the next host).  Viewer: the record is
/// removed and the host, if connected, is told which viewer left.
pub fn on_disconnect(registry: &mut SessionRegistry, id: &ConnectionId) -> Vec<Effect> {
    let mut effects = Vec::new();

    if registry.is_host(id) {
        registry.remove_host();
        effects.extend(
            registry
                .disarm_all_retries()
                .into_iter()
                .map(|viewer| Effect::CancelRetry { viewer }),
        );
        let viewers = registry.reset_connected_viewers();
        info!(host = %id, viewers = viewers.len(), "host disconnected");
        effects.extend(
            viewers
                .iter()
                .filter(|viewer_id| *viewer_id != id)
                .map(|viewer_id| Effect::send(viewer_id, ServerMessage::HostDisconnected)),
        );
    }

    if let Some(viewer) = registry.remove_viewer(id) {
        if viewer.pending_retry.is_some() {
            effects.push(Effect::CancelRetry { viewer: id.clone() });
        }
        if let Some(host_id) = registry.connected_host() {
            effects.push(Effect::send(
                host_id,
                ServerMessage::ViewerDisconnected {
                    viewer_id: id.clone(),
                },
            ));
        }
        info!(viewer = %id, remaining = registry.viewer_count(), "viewer disconnected");
    }

    effects
}

/// A viewer's retry timer fired.
///
/// Ticks from a timer that has since been replaced or disarmed are ignored.
pub fn on_retry_tick(
    registry: &mut SessionRegistry,
    viewer_id: &ConnectionId,
    epoch: u64,
    max_retries: u32,
) -> Vec<Effect> {
    let cancel = || Effect::CancelRetry {
        viewer: viewer_id.clone(),
    };

    let sharing = registry.is_sharing();
    let host_id = registry.connected_host().cloned();

    let Some(viewer) = registry.viewer_mut(viewer_id) else {
        return vec![cancel()];
    };
    let Some(pending) = viewer.pending_retry.as_mut() else {
        return Vec::new();
    };
    if pending.epoch != epoch {
        return Vec::new();
    }

    if viewer.has_answered {
        viewer.pending_retry = None;
        return vec![cancel()];
    }

    pending.attempts += 1;
    let attempt = pending.attempts;

    match host_id {
        Some(host_id) if attempt <= max_retries && sharing => {
            debug!(viewer = %viewer_id, attempt, "re-prompting host for an offer");
            vec![Effect::send(
                &host_id,
                ServerMessage::NewViewer {
                    viewer_id: viewer_id.clone(),
                },
            )]
        }
        _ => {
            viewer.pending_retry = None;
            warn!(viewer = %viewer_id, attempt, "handshake retries exhausted; suggesting refresh");
            vec![
                cancel(),
                Effect::send(viewer_id, ServerMessage::SuggestRefresh),
            ]
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
