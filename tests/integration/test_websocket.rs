//! Integration tests for the session event stream.
//!
//! These tests drive the HTTP API and check the events every connected
//! WebSocket client observes.

mod common;

use std::time::Duration;

use common::{spawn_app, spawn_mock_oracle, ApiClient, MockReply, GOOD_EXPLANATION};
use futures::StreamExt;
use gatecode_core::{SessionEvent, Stage};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(client: &ApiClient) -> WsClient {
    let (ws, _) = connect_async(client.ws_url())
        .await
        .expect("Failed to connect");
    ws
}

/// Reads the next session event, skipping control frames.
async fn next_event(ws: &mut WsClient) -> SessionEvent {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for event")
            .expect("Stream closed")
            .expect("WebSocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("Failed to parse event");
        }
    }
}

async fn next_events(ws: &mut WsClient, count: usize) -> Vec<SessionEvent> {
    let mut events = Vec::with_capacity(count);
    for _ in 0..count {
        events.push(next_event(ws).await);
    }
    events
}

fn names(events: &[SessionEvent]) -> Vec<&'static str> {
    events.iter().map(SessionEvent::event_name).collect()
}

#[tokio::test]
async fn test_connected_event_carries_snapshot() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(90), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let mut ws = connect(&client).await;
    match next_event(&mut ws).await {
        SessionEvent::Connected(payload) => {
            assert_eq!(payload.snapshot.stage, Stage::Question);
            assert!(payload.snapshot.editor_locked);
            assert_eq!(payload.snapshot.problem_title, "Two Sum");
        }
        other => unreachable!("expected connected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_approved_flow_event_sequence() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(85), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let mut ws = connect(&client).await;
    next_event(&mut ws).await;

    client.post("/api/session/start", None).await;
    client.submit(GOOD_EXPLANATION).await;
    client.post("/api/session/proceed", None).await;

    let events = next_events(&mut ws, 5).await;
    assert_eq!(
        names(&events),
        vec![
            "stage_changed",
            "stage_changed",
            "verification_started",
            "verification_completed",
            "stage_changed",
        ]
    );

    match &events[1] {
        SessionEvent::StageChanged(payload) => {
            assert_eq!(payload.from, Stage::Logic);
            assert_eq!(payload.to, Stage::Verification);
            assert!(payload.editor_locked);
        }
        other => unreachable!("expected stage_changed, got {other:?}"),
    }
    match (&events[2], &events[3]) {
        (SessionEvent::VerificationStarted(started), SessionEvent::VerificationCompleted(done)) => {
            assert_eq!(started.generation, done.generation);
            assert_eq!(done.result.score, 85);
            assert!(done.result.approved);
        }
        other => unreachable!("unexpected events {other:?}"),
    }
    match &events[4] {
        SessionEvent::StageChanged(payload) => {
            assert_eq!(payload.to, Stage::Code);
            assert!(!payload.editor_locked);
        }
        other => unreachable!("expected stage_changed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_every_client_receives_events() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(70), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let mut first = connect(&client).await;
    let mut second = connect(&client).await;
    next_event(&mut first).await;
    next_event(&mut second).await;

    client.post("/api/session/start", None).await;

    for ws in [&mut first, &mut second] {
        match next_event(ws).await {
            SessionEvent::StageChanged(payload) => {
                assert_eq!(payload.from, Stage::Question);
                assert_eq!(payload.to, Stage::Logic);
            }
            other => unreachable!("expected stage_changed, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_retry_while_pending_emits_discarded() {
    let (endpoint, mock) =
        spawn_mock_oracle(MockReply::Score(99), Duration::from_millis(300)).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;

    let mut ws = connect(&client).await;
    next_event(&mut ws).await;

    let submit = {
        let client = client.clone();
        tokio::spawn(async move { client.submit(GOOD_EXPLANATION).await })
    };
    while mock.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    client.post("/api/session/retry", None).await;
    submit.await.expect("Submit task failed");

    let events = next_events(&mut ws, 4).await;
    assert_eq!(
        names(&events),
        vec![
            "stage_changed",
            "verification_started",
            "stage_changed",
            "verification_discarded",
        ]
    );
    match (&events[1], &events[3]) {
        (
            SessionEvent::VerificationStarted(started),
            SessionEvent::VerificationDiscarded(discarded),
        ) => assert_eq!(started.generation, discarded.generation),
        other => unreachable!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_submission_emits_no_event() {
    let (endpoint, mock) = spawn_mock_oracle(MockReply::Score(90), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    let mut ws = connect(&client).await;
    next_event(&mut ws).await;

    let (status, _) = client.submit("too short").await;
    assert_eq!(status, 422);
    client.submit(GOOD_EXPLANATION).await;

    // The accepted submission is the first event after the rejected one.
    match next_event(&mut ws).await {
        SessionEvent::StageChanged(payload) => {
            assert_eq!(payload.from, Stage::Logic);
            assert_eq!(payload.to, Stage::Verification);
        }
        other => unreachable!("expected stage_changed, got {other:?}"),
    }
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_reset_from_verification_emits_stage_change() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(30), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    client.submit(GOOD_EXPLANATION).await;
    let mut ws = connect(&client).await;
    next_event(&mut ws).await;

    client.post("/api/session/reset", None).await;
    match next_event(&mut ws).await {
        SessionEvent::StageChanged(payload) => {
            assert_eq!(payload.from, Stage::Verification);
            assert_eq!(payload.to, Stage::Logic);
            assert!(payload.editor_locked);
        }
        other => unreachable!("expected stage_changed, got {other:?}"),
    }
}
