//! Signaling router: forwards offers, answers and candidates.
//!
//! The router decides *who* receives a signaling message.  It never looks
//! inside a payload.  Whatever it cannot deliver (wrong sender role, unknown
//! or disconnected target, duplicate answer) is dropped with a `debug!` line:
//! those are ordinary races in a best-effort protocol, not errors.
//!
//! State changes the router needs (storing the host's offer, starting a new
//! offer cycle, recording an answer) go through the registry's API.
//!
//! # Answer deduplication
//!
//! A viewer's answer is forwarded at most once per offer cycle.  A late
//! duplicate arriving after the handshake completed would otherwise make the
//! host apply a second remote description to a connection that is already
//! stable.  The gate reopens when a new offer cycle starts for that viewer.

use cast_core::{ConnectionId, ServerMessage, SessionRegistry, SignalPayload};
use tracing::debug;

use crate::application::effects::Effect;

/// Routes the host's offer to one viewer (`target`) or to all of them.
///
/// Only the current host may send offers.  The offer becomes the registry's
/// `host_stream`, and every receiving viewer starts a new offer cycle.
pub fn route_offer(
    registry: &mut SessionRegistry,
    from: &ConnectionId,
    payload: SignalPayload,
    target: Option<&ConnectionId>,
) -> Vec<Effect> {
    if !registry.is_host(from) {
        debug!(connection = %from, "dropping offer from non-host");
        return Vec::new();
    }

    registry.set_host_stream(payload.clone());

    match target {
        Some(viewer_id) => match registry.viewer_mut(viewer_id) {
            Some(viewer) if viewer.is_connected => {
                viewer.reset_handshake();
                debug!(viewer = %viewer_id, "routing offer to viewer");
                vec![Effect::send(
                    viewer_id,
                    ServerMessage::Offer {
                        payload,
                        viewer_id: viewer_id.clone(),
                    },
                )]
            }
            _ => {
                debug!(viewer = %viewer_id, "dropping offer for unknown or disconnected viewer");
                Vec::new()
            }
        },
        None => {
            let viewers = registry.reset_connected_viewers();
            debug!(viewers = viewers.len(), "broadcasting offer");
            viewers
                .into_iter()
                .map(|viewer_id| Effect::Send {
                    message: ServerMessage::Offer {
                        payload: payload.clone(),
                        viewer_id: viewer_id.clone(),
                    },
                    to: viewer_id,
                })
                .collect()
        }
    }
}

/// Forwards a viewer's answer to the host, at most once per offer cycle.
///
/// The forwarded answer is tagged with the sender's connection id.  Accepting
/// an answer also ends any pending offer retry for that viewer.
pub fn route_answer(
    registry: &mut SessionRegistry,
    from: &ConnectionId,
    payload: SignalPayload,
) -> Vec<Effect> {
    match registry.viewer(from) {
        Some(viewer) if viewer.is_connected && !viewer.has_answered => {}
        Some(_) => {
            debug!(viewer = %from, "dropping duplicate or stale answer");
            return Vec::new();
        }
        None => {
            debug!(connection = %from, "dropping answer from unregistered connection");
            return Vec::new();
        }
    }

    let Some(host_id) = registry.connected_host().cloned() else {
        debug!(viewer = %from, "dropping answer: no connected host");
        return Vec::new();
    };

    let mut effects = Vec::with_capacity(2);
    if let Some(viewer) = registry.viewer_mut(from) {
        viewer.record_answer(payload.clone());
    }
    if registry.disarm_retry(from).is_some() {
        effects.push(Effect::CancelRetry {
            viewer: from.clone(),
        });
    }
    debug!(viewer = %from, "forwarding answer to host");
    effects.push(Effect::send(
        &host_id,
        ServerMessage::Answer {
            payload,
            viewer_id: from.clone(),
        },
    ));
    effects
}

/// Relays a network-path candidate.
///
/// From the host: to `target` if given (dropped if that viewer is gone),
/// otherwise to every connected viewer.  From a viewer: to the host.  From
/// anyone else: dropped.  Candidates are never queued.
pub fn route_candidate(
    registry: &SessionRegistry,
    from: &ConnectionId,
    candidate: SignalPayload,
    target: Option<&ConnectionId>,
) -> Vec<Effect> {
    let relay = |to: &ConnectionId, candidate: SignalPayload| {
        Effect::send(
            to,
            ServerMessage::IceCandidate {
                candidate,
                from_id: from.clone(),
            },
        )
    };

    if registry.is_host(from) {
        return match target {
            Some(viewer_id) => match registry.viewer(viewer_id) {
                Some(viewer) if viewer.is_connected => vec![relay(viewer_id, candidate)],
                _ => {
                    debug!(viewer = %viewer_id, "dropping candidate for unknown or disconnected viewer");
                    Vec::new()
                }
            },
            None => registry
                .viewers()
                .filter(|v| v.is_connected)
                .map(|v| relay(&v.id, candidate.clone()))
                .collect(),
        };
    }

    if registry.viewer(from).is_none() {
        debug!(connection = %from, "dropping candidate from unregistered connection");
        return Vec::new();
    }

    match registry.connected_host() {
        Some(host_id) => vec![relay(host_id, candidate)],
        None => {
            debug!(viewer = %from, "dropping candidate: no connected host");
            Vec::new()
        }
    }
}

/// Forwards a viewer's request for lower capture quality to the host.
pub fn route_quality_reduction(registry: &SessionRegistry, from: &ConnectionId) -> Vec<Effect> {
    if registry.viewer(from).is_none() {
        debug!(connection = %from, "dropping quality request from non-viewer");
        return Vec::new();
    }
    match registry.connected_host() {
        Some(host_id) => vec![Effect::send(
            host_id,
            ServerMessage::ViewerRequestsQualityReduction {
                viewer_id: from.clone(),
            },
        )],
        None => Vec::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
