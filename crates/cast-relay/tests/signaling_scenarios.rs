//! End-to-end signaling scenarios without a network.
//!
//! The first half drives [`SignalingHub`] directly and inspects the effects it
//! returns.  The second half runs the real hub task with paused Tokio time so
//! the retry timers fire deterministically.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_test::assert_ok;

use cast_core::{ClientMessage, ConnectionId, RetryPolicy, ServerMessage, SignalPayload};
use cast_relay::application::{Effect, RelayEvent, SignalingHub};
use cast_relay::infrastructure::{spawn_hub, HubHandle};

fn id(s: &str) -> ConnectionId {
    ConnectionId::new(s)
}

fn payload(v: Value) -> SignalPayload {
    SignalPayload::new(v)
}

fn inbound(from: &str, message: ClientMessage) -> RelayEvent {
    RelayEvent::Inbound {
        from: id(from),
        message,
    }
}

fn sends_to<'a>(effects: &'a [Effect], to: &str) -> Vec<&'a ServerMessage> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send { to: t, message } if t.as_str() == to => Some(message),
            _ => None,
        })
        .collect()
}

// ── Pure hub scenarios ────────────────────────────────────────────────────────

#[test]
fn test_only_first_host_registration_succeeds() {
    // Arrange
    let mut hub = SignalingHub::default();

    // Act
    let first = hub.handle(inbound("h1", ClientMessage::RegisterHost));
    let rejected: Vec<_> = ["h2", "h3", "h2"]
        .iter()
        .map(|h| hub.handle(inbound(h, ClientMessage::RegisterHost)))
        .collect();

    // Assert
    assert!(first.is_empty());
    for (effects, h) in rejected.iter().zip(["h2", "h3", "h2"]) {
        assert_eq!(sends_to(effects, h), vec![&ServerMessage::HostExists]);
    }
    assert!(hub.registry().is_host(&id("h1")));
}

#[test]
fn test_host_slot_reopens_after_disconnect() {
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h1", ClientMessage::RegisterHost));
    hub.handle(RelayEvent::Disconnected { id: id("h1") });

    let effects = hub.handle(inbound("h2", ClientMessage::RegisterHost));

    assert!(effects.is_empty());
    assert!(hub.registry().is_host(&id("h2")));
}

#[test]
fn test_registering_viewer_twice_keeps_one_fresh_entry() {
    // Arrange
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("v", ClientMessage::RegisterViewer));
    hub.handle(inbound(
        "v",
        ClientMessage::Answer {
            payload: payload(json!({"sdp": "a"})),
            viewer_id: None,
        },
    ));

    // Act
    hub.handle(inbound("v", ClientMessage::RegisterViewer));

    // Assert
    assert_eq!(hub.registry().viewer_count(), 1);
    let viewer = hub.registry().viewer(&id("v")).unwrap();
    assert!(!viewer.has_answered);
    assert!(viewer.last_answer.is_none());
}

#[test]
fn test_two_viewers_complete_handshake_without_retries() {
    // Arrange: host sharing, two viewers asking for the stream
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("h", ClientMessage::HostStartedSharing));
    hub.handle(inbound("v1", ClientMessage::RegisterViewer));
    hub.handle(inbound("v2", ClientMessage::RegisterViewer));
    let req1 = hub.handle(inbound("v1", ClientMessage::RequestStream));
    let req2 = hub.handle(inbound("v2", ClientMessage::RequestStream));

    // Act
    let ans1 = hub.handle(inbound(
        "v1",
        ClientMessage::Answer {
            payload: payload(json!({"sdp": "one"})),
            viewer_id: Some(id("v1")),
        },
    ));
    let ans2 = hub.handle(inbound(
        "v2",
        ClientMessage::Answer {
            payload: payload(json!({"sdp": "two"})),
            viewer_id: Some(id("v2")),
        },
    ));

    // Assert: one new-viewer per viewer
    assert_eq!(
        sends_to(&req1, "h"),
        vec![&ServerMessage::NewViewer { viewer_id: id("v1") }]
    );
    assert_eq!(
        sends_to(&req2, "h"),
        vec![&ServerMessage::NewViewer { viewer_id: id("v2") }]
    );

    // Answers reach the host tagged with the right viewer
    assert_eq!(
        sends_to(&ans1, "h"),
        vec![&ServerMessage::Answer {
            payload: payload(json!({"sdp": "one"})),
            viewer_id: id("v1"),
        }]
    );
    assert_eq!(
        sends_to(&ans2, "h"),
        vec![&ServerMessage::Answer {
            payload: payload(json!({"sdp": "two"})),
            viewer_id: id("v2"),
        }]
    );

    // Both retry timers are cancelled
    assert!(ans1.contains(&Effect::CancelRetry { viewer: id("v1") }));
    assert!(ans2.contains(&Effect::CancelRetry { viewer: id("v2") }));
    assert!(hub.registry().viewers().all(|v| v.pending_retry.is_none()));
}

#[test]
fn test_second_answer_in_same_cycle_is_dropped() {
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("v", ClientMessage::RegisterViewer));
    let answer = || ClientMessage::Answer {
        payload: payload(json!({"sdp": "a"})),
        viewer_id: None,
    };
    hub.handle(inbound("v", answer()));

    let second = hub.handle(inbound("v", answer()));

    assert!(second.is_empty());
}

#[test]
fn test_new_offer_cycle_reopens_answer_gate() {
    // Arrange: an answered viewer
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("v", ClientMessage::RegisterViewer));
    hub.handle(inbound(
        "v",
        ClientMessage::Answer {
            payload: payload(json!("first")),
            viewer_id: None,
        },
    ));

    // Act: the host re-offers to that viewer, which answers again
    hub.handle(inbound(
        "h",
        ClientMessage::Offer {
            payload: payload(json!({"sdp": "again"})),
            viewer_id: Some(id("v")),
        },
    ));
    let effects = hub.handle(inbound(
        "v",
        ClientMessage::Answer {
            payload: payload(json!("second")),
            viewer_id: None,
        },
    ));

    // Assert
    assert_eq!(sends_to(&effects, "h").len(), 1);
}

#[test]
fn test_departed_viewer_receives_nothing_and_host_is_told_once() {
    // Arrange
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("v", ClientMessage::RegisterViewer));

    // Act
    let gone = hub.handle(RelayEvent::Disconnected { id: id("v") });
    let offer = hub.handle(inbound(
        "h",
        ClientMessage::Offer {
            payload: payload(json!({"sdp": "s"})),
            viewer_id: Some(id("v")),
        },
    ));
    let candidate = hub.handle(inbound(
        "h",
        ClientMessage::IceCandidate {
            candidate: payload(json!({"candidate": "c"})),
            target_id: Some(id("v")),
        },
    ));
    let again = hub.handle(RelayEvent::Disconnected { id: id("v") });

    // Assert
    assert_eq!(
        sends_to(&gone, "h"),
        vec![&ServerMessage::ViewerDisconnected { viewer_id: id("v") }]
    );
    assert!(sends_to(&offer, "v").is_empty());
    assert!(sends_to(&candidate, "v").is_empty());
    assert!(again.is_empty());
}

#[test]
fn test_host_disconnect_resets_broadcast_state() {
    // Arrange
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("h", ClientMessage::HostStartedSharing));
    hub.handle(inbound("v1", ClientMessage::RegisterViewer));
    hub.handle(inbound("v2", ClientMessage::RegisterViewer));
    hub.handle(inbound(
        "h",
        ClientMessage::Offer {
            payload: payload(json!({"sdp": "s"})),
            viewer_id: None,
        },
    ));

    // Act
    let effects = hub.handle(RelayEvent::Disconnected { id: id("h") });

    // Assert
    let registry = hub.registry();
    assert!(registry.host().is_none());
    assert!(registry.host_stream().is_none());
    assert!(!registry.is_sharing());
    assert_eq!(sends_to(&effects, "v1"), vec![&ServerMessage::HostDisconnected]);
    assert_eq!(sends_to(&effects, "v2"), vec![&ServerMessage::HostDisconnected]);
}

#[test]
fn test_quality_reduction_reaches_host_with_viewer_id() {
    let mut hub = SignalingHub::default();
    hub.handle(inbound("h", ClientMessage::RegisterHost));
    hub.handle(inbound("v", ClientMessage::RegisterViewer));

    let effects = hub.handle(inbound("v", ClientMessage::RequestQualityReduction));

    assert_eq!(
        sends_to(&effects, "h"),
        vec![&ServerMessage::ViewerRequestsQualityReduction { viewer_id: id("v") }]
    );
}

// ── Hub task with paused time ─────────────────────────────────────────────────

/// Attaches `name` to the hub and consumes its `welcome`.
async fn attach(hub: &HubHandle, name: &str) -> mpsc::Receiver<String> {
    let (tx, mut rx) = mpsc::channel(64);
    assert_ok!(hub.attach(id(name), tx).await);
    let welcome = frame_type(&rx.recv().await.expect("welcome frame"));
    assert_eq!(welcome, "welcome");
    rx
}

fn frame(text: &str) -> Value {
    serde_json::from_str(text).expect("server frames are JSON")
}

fn frame_type(text: &str) -> String {
    frame(text)["type"].as_str().unwrap_or_default().to_string()
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(text) = rx.try_recv() {
        frames.push(frame(&text));
    }
    frames
}

fn new_viewer_prompts(frames: &[Value], viewer: &str) -> usize {
    frames
        .iter()
        .filter(|f| f["type"] == "new-viewer" && f["viewerId"] == viewer)
        .count()
}

async fn send(hub: &HubHandle, from: &str, message: ClientMessage) {
    assert_ok!(hub.inbound(id(from), message).await);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_viewer_alone_is_told_to_refresh() {
    // Arrange: host sharing, v1 stalls, v2 answers
    let (hub, _join) = spawn_hub(RetryPolicy::default(), 64);
    let mut host = attach(&hub, "h").await;
    let mut stalled = attach(&hub, "v1").await;
    let mut healthy = attach(&hub, "v2").await;

    send(&hub, "h", ClientMessage::RegisterHost).await;
    send(&hub, "h", ClientMessage::HostStartedSharing).await;
    send(&hub, "v1", ClientMessage::RegisterViewer).await;
    send(&hub, "v2", ClientMessage::RegisterViewer).await;
    send(&hub, "v1", ClientMessage::RequestStream).await;
    send(&hub, "v2", ClientMessage::RequestStream).await;
    send(
        &hub,
        "v2",
        ClientMessage::Answer {
            payload: payload(json!({"sdp": "ok"})),
            viewer_id: None,
        },
    )
    .await;
    let start = Instant::now();

    // Act
    let refresh = stalled.recv().await.expect("suggest-refresh frame");
    let elapsed = start.elapsed();

    // Assert: prompts at 0, 3, 6, 9 s; refresh at 12 s
    assert_eq!(frame_type(&refresh), "suggest-refresh");
    assert!(elapsed >= Duration::from_secs(12), "refreshed after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(13), "refreshed after {elapsed:?}");

    let host_frames = drain(&mut host);
    assert_eq!(new_viewer_prompts(&host_frames, "v1"), 4);
    assert_eq!(new_viewer_prompts(&host_frames, "v2"), 1);
    assert!(drain(&mut healthy).is_empty());

    let snapshot = assert_ok!(hub.snapshot().await);
    assert!(snapshot.pending_retries.is_empty());
    assert_eq!(snapshot.active_timers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_answer_stops_reprompting() {
    // Arrange
    let (hub, _join) = spawn_hub(RetryPolicy::default(), 64);
    let mut host = attach(&hub, "h").await;
    let mut viewer = attach(&hub, "v").await;
    send(&hub, "h", ClientMessage::RegisterHost).await;
    send(&hub, "h", ClientMessage::HostStartedSharing).await;
    send(&hub, "v", ClientMessage::RegisterViewer).await;
    send(&hub, "v", ClientMessage::RequestStream).await;

    // Act: answer after one re-prompt, then wait well past the budget
    tokio::time::sleep(Duration::from_millis(3500)).await;
    send(
        &hub,
        "v",
        ClientMessage::Answer {
            payload: payload(json!({"sdp": "late"})),
            viewer_id: None,
        },
    )
    .await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    // Assert
    let host_frames = drain(&mut host);
    assert_eq!(new_viewer_prompts(&host_frames, "v"), 2);
    assert_eq!(
        host_frames.iter().filter(|f| f["type"] == "answer").count(),
        1
    );
    assert!(drain(&mut viewer).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_disconnect_cancels_pending_retries() {
    // Arrange
    let (hub, _join) = spawn_hub(RetryPolicy::default(), 64);
    let _host = attach(&hub, "h").await;
    let mut viewer = attach(&hub, "v").await;
    send(&hub, "h", ClientMessage::RegisterHost).await;
    send(&hub, "h", ClientMessage::HostStartedSharing).await;
    send(&hub, "v", ClientMessage::RegisterViewer).await;
    send(&hub, "v", ClientMessage::RequestStream).await;

    // Act
    assert_ok!(hub.disconnected(id("h")).await);
    tokio::time::sleep(Duration::from_secs(30)).await;

    // Assert: told once that the host left, never told to refresh
    let frames = drain(&mut viewer);
    let types: Vec<&str> = frames.iter().filter_map(|f| f["type"].as_str()).collect();
    assert_eq!(types, vec!["host-disconnected"]);
    let snapshot = assert_ok!(hub.snapshot().await);
    assert_eq!(snapshot.active_timers, 0);
    assert!(snapshot.host.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_start_sharing_arms_retry_for_waiting_viewers() {
    // Arrange: viewer asks before the host shares
    let (hub, _join) = spawn_hub(
        RetryPolicy {
            interval: Duration::from_secs(1),
            max_retries: 1,
        },
        64,
    );
    let mut host = attach(&hub, "h").await;
    let mut viewer = attach(&hub, "v").await;
    send(&hub, "h", ClientMessage::RegisterHost).await;
    send(&hub, "v", ClientMessage::RegisterViewer).await;
    send(&hub, "v", ClientMessage::RequestStream).await;

    // Act
    send(&hub, "h", ClientMessage::HostStartedSharing).await;
    let refresh = viewer.recv().await.expect("suggest-refresh frame");

    // Assert: one prompt at start, one re-prompt, then refresh
    assert_eq!(frame_type(&refresh), "suggest-refresh");
    assert_eq!(new_viewer_prompts(&drain(&mut host), "v"), 2);
}
