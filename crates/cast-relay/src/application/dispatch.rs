//! Event dispatch: one entry point that turns a [`RelayEvent`] into effects.
//!
//! [`SignalingHub`] owns the [`SessionRegistry`] and is driven by exactly one
//! task.  Every inbound frame, disconnect and retry tick passes through
//! [`SignalingHub::handle`] in arrival order, so handlers never observe a
//! half-applied transition.

use cast_core::{ClientMessage, ConnectionId, RetryPolicy, ServerMessage, SessionRegistry};
use tracing::{debug, info};

use crate::application::effects::{Effect, RelayEvent};
use crate::application::{lifecycle, signaling_router};

/// The registry plus the retry policy, behind a single `handle` method.
#[derive(Debug, Default)]
pub struct SignalingHub {
    registry: SessionRegistry,
    policy: RetryPolicy,
}

impl SignalingHub {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            registry: SessionRegistry::new(),
            policy,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Applies one event and returns the effects to execute, in order.
    pub fn handle(&mut self, event: RelayEvent) -> Vec<Effect> {
        match event {
            RelayEvent::Inbound { from, message } => self.handle_message(&from, message),
            RelayEvent::Disconnected { id } => lifecycle::on_disconnect(&mut self.registry, &id),
            RelayEvent::RetryTick { viewer, epoch } => lifecycle::on_retry_tick(
                &mut self.registry,
                &viewer,
                epoch,
                self.policy.max_retries,
            ),
        }
    }

    fn handle_message(&mut self, from: &ConnectionId, message: ClientMessage) -> Vec<Effect> {
        debug!(connection = %from, message = message.name(), "inbound");

        match message {
            ClientMessage::RegisterHost => self.register_host(from),
            ClientMessage::RegisterViewer => self.register_viewer(from),
            ClientMessage::RequestStream => lifecycle::on_stream_request(&mut self.registry, from),
            ClientMessage::HostStartedSharing => {
                if !self.registry.is_host(from) {
                    debug!(connection = %from, "ignoring start-sharing from non-host");
                    return Vec::new();
                }
                lifecycle::on_host_start_sharing(&mut self.registry)
            }
            ClientMessage::StopSharing => {
                if !self.registry.is_host(from) {
                    debug!(connection = %from, "ignoring stop-sharing from non-host");
                    return Vec::new();
                }
                lifecycle::on_host_stop_sharing(&mut self.registry)
            }
            ClientMessage::Offer { payload, viewer_id } => signaling_router::route_offer(
                &mut self.registry,
                from,
                payload,
                viewer_id.as_ref(),
            ),
            ClientMessage::Answer { payload, .. } => {
                signaling_router::route_answer(&mut self.registry, from, payload)
            }
            ClientMessage::IceCandidate {
                candidate,
                target_id,
            } => signaling_router::route_candidate(
                &self.registry,
                from,
                candidate,
                target_id.as_ref(),
            ),
            ClientMessage::RequestQualityReduction => {
                signaling_router::route_quality_reduction(&self.registry, from)
            }
        }
    }

    fn register_host(&mut self, from: &ConnectionId) -> Vec<Effect> {
        match self.registry.register_host(from.clone()) {
            Ok(()) => {
                info!(host = %from, "host registered");
                Vec::new()
            }
            Err(e) => {
                info!(connection = %from, error = %e, "rejecting second host");
                vec![Effect::send(from, ServerMessage::HostExists)]
            }
        }
    }

    fn register_viewer(&mut self, from: &ConnectionId) -> Vec<Effect> {
        let replaced = self.registry.register_viewer(from.clone());
        info!(
            viewer = %from,
            viewers = self.registry.viewer_count(),
            "viewer registered"
        );
        match replaced {
            Some(previous) if previous.pending_retry.is_some() => {
                vec![Effect::CancelRetry {
                    viewer: from.clone(),
                }]
            }
            _ => Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
