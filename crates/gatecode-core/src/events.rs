//! Session events and their WebSocket stream.
//!
//! Every stage change and verification outcome is broadcast to connected
//! clients so the presentation layer can follow a session live.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes a session snapshot
//! - `stage_changed` - The session moved between stages
//! - `verification_started` - An explanation was sent to the oracle
//! - `verification_completed` - A result was applied
//! - `verification_discarded` - A late result was dropped
//!
//! # Example
//!
//! ```no_run
//! use gatecode_core::events::{EventBroadcaster, SessionEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::verification_started(1));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::session::SessionSnapshot;
use crate::stage::Stage;
use crate::verification::VerificationResult;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it is when the client connects.
    pub snapshot: SessionSnapshot,
}

/// Payload for the `stage_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangedPayload {
    /// Stage before the transition.
    pub from: Stage,
    /// Stage after the transition.
    pub to: Stage,
    /// Whether the editor is locked in the new stage.
    pub editor_locked: bool,
}

/// Payload for the `verification_started` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStartedPayload {
    /// Generation of the call.
    pub generation: u64,
    /// When the call was issued.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `verification_completed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCompletedPayload {
    /// Generation of the call.
    pub generation: u64,
    /// The applied result.
    pub result: VerificationResult,
}

/// Payload for the `verification_discarded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationDiscardedPayload {
    /// Generation of the stale call.
    pub generation: u64,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events emitted by a session.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent on every stage transition.
    StageChanged(StageChangedPayload),
    /// Sent when an explanation is handed to the oracle.
    VerificationStarted(VerificationStartedPayload),
    /// Sent when a verification result is applied.
    VerificationCompleted(VerificationCompletedPayload),
    /// Sent when a stale result is dropped.
    VerificationDiscarded(VerificationDiscardedPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(snapshot: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { snapshot })
    }

    /// Creates a `StageChanged` event.
    #[must_use]
    pub const fn stage_changed(from: Stage, to: Stage) -> Self {
        Self::StageChanged(StageChangedPayload {
            from,
            to,
            editor_locked: to.locks_editor(),
        })
    }

    /// Creates a `VerificationStarted` event.
    #[must_use]
    pub fn verification_started(generation: u64) -> Self {
        Self::VerificationStarted(VerificationStartedPayload {
            generation,
            timestamp: Utc::now(),
        })
    }

    /// Creates a `VerificationCompleted` event.
    #[must_use]
    pub const fn verification_completed(generation: u64, result: VerificationResult) -> Self {
        Self::VerificationCompleted(VerificationCompletedPayload { generation, result })
    }

    /// Creates a `VerificationDiscarded` event.
    #[must_use]
    pub const fn verification_discarded(generation: u64) -> Self {
        Self::VerificationDiscarded(VerificationDiscardedPayload { generation })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::StageChanged(_) => "stage_changed",
            Self::VerificationStarted(_) => "verification_started",
            Self::VerificationCompleted(_) => "verification_completed",
            Self::VerificationDiscarded(_) => "verification_discarded",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all subscribers.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls behind receives a `Lagged` error and misses
    /// some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event and returns how many subscribers will receive it.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Upgrading session event stream");
    ws.on_upgrade(move |socket| stream_session(socket, state))
}

type EventSink = SplitSink<WebSocket, Message>;

/// Serializes `event` and writes it to the socket.
///
/// Returns `false` once the client is gone.
async fn forward(sink: &mut EventSink, event: &SessionEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Dropping unserializable session event");
            true
        }
    }
}

/// Streams session events to one client.
///
/// Opens with a `connected` snapshot, then relays every broadcast event.
/// Pings every 30 seconds and closes after 3 unanswered pings.
async fn stream_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut incoming) = socket.split();

    // Subscribe before taking the snapshot so no event falls in between
    let mut events = state.controller.events().subscribe();
    let snapshot = state.controller.snapshot().await;
    let stage = snapshot.stage;

    if !forward(&mut sink, &SessionEvent::connected(snapshot)).await {
        debug!("Observer left before the snapshot was sent");
        return;
    }
    info!(%stage, "Session observer connected");

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    // the first tick completes immediately
    heartbeat.tick().await;
    let mut unanswered = 0u8;

    loop {
        tokio::select! {
            frame = incoming.next() => match frame {
                Some(Ok(Message::Pong(_))) => unanswered = 0,
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Observers are read-only; commands go through the HTTP API
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Session stream read failed");
                    break;
                }
            },

            received = events.recv() => match received {
                Ok(event) => {
                    if !forward(&mut sink, &event).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session observer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                unanswered += 1;
                if unanswered >= MAX_MISSED_PONGS {
                    info!(unanswered, "Dropping unresponsive session observer");
                    break;
                }
            }
        }
    }

    debug!("Session observer disconnected");
}

// ============================================================================
// Tests
// ============================================================================
