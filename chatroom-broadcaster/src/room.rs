use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::events::{MessageRecord, OutboundEvent};
use crate::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::registry::{ConnectionId, ParticipantId, SessionRegistry};
use crate::transport::{RoomHandler, Transport};

/// Default namespace clients must name in their handshake.
pub const DEFAULT_NAMESPACE: &str = "/ws/chat";

/// Announcement posted on behalf of a connection when it joins
pub const JOIN_TEXT: &str = "has joined the chat";

/// Announcement posted on behalf of a connection when it leaves
pub const LEAVE_TEXT: &str = "has left the room";

/// Room tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Records kept for join-time replay
    pub history_capacity: usize,
    /// Routing key checked by the transport, not by the room
    pub namespace: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Everything guarded by the room lock.
struct RoomState {
    history: HistoryBuffer,
    sessions: SessionRegistry,
}

/// The single chat room.
///
/// History and sessions live behind one mutex. Every operation copies what it
/// needs out of the critical section and only then talks to the transport, so
/// a slow client never stalls other connections.
pub struct BroadcastRoom {
    config: RoomConfig,
    state: Mutex<RoomState>,
    transport: Arc<dyn Transport>,
}

impl BroadcastRoom {
    pub fn new(config: RoomConfig, transport: Arc<dyn Transport>) -> Self {
        let state = RoomState {
            history: HistoryBuffer::new(config.history_capacity),
            sessions: SessionRegistry::new(),
        };

        Self {
            config,
            state: Mutex::new(state),
            transport,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Register `connection`, replay history to it, then announce the join.
    pub async fn connect(&self, connection: &ConnectionId) -> ParticipantId {
        let (participant, recent) = {
            let mut state = self.state.lock();
            let participant = state.sessions.register(connection.clone());
            (participant, state.history.snapshot())
        };

        tracing::info!(
            "Client {} joined as {} ({} records to replay)",
            connection,
            participant.label(),
            recent.len()
        );

        if !recent.is_empty() {
            self.transport
                .send_to(connection, &OutboundEvent::Messages(recent))
                .await;
        }

        self.post(connection, JOIN_TEXT).await;
        participant
    }

    /// Announce the departure, then forget the session.
    pub async fn disconnect(&self, connection: &ConnectionId) -> Option<ParticipantId> {
        self.post(connection, LEAVE_TEXT).await;

        let removed = self.state.lock().sessions.unregister(connection);
        match removed {
            Some(participant) => {
                tracing::info!("Client {} ({}) left", connection, participant.label())
            }
            None => tracing::debug!("Disconnect for unknown connection {}", connection),
        }
        removed
    }

    /// Record `text` from `connection` and broadcast it.
    ///
    /// Returns `None` without touching any state when the connection is not
    /// a registered member.
    pub async fn post(&self, connection: &ConnectionId, text: impl Into<String>) -> Option<MessageRecord> {
        let record = {
            let mut state = self.state.lock();
            let participant = match state.sessions.lookup(connection) {
                Ok(participant) => participant,
                Err(e) => {
                    tracing::debug!("Dropping post: {}", e);
                    return None;
                }
            };

            let record = MessageRecord::now(participant.label(), text);
            state.history.append(record.clone());
            record
        };

        self.transport
            .broadcast(&OutboundEvent::single(record.clone()))
            .await;

        Some(record)
    }

    /// Current history, oldest first.
    pub fn recent_messages(&self) -> Vec<MessageRecord> {
        self.state.lock().history.snapshot()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }
}

#[async_trait]
impl RoomHandler for BroadcastRoom {
    async fn on_connect(&self, connection: &ConnectionId) {
        self.connect(connection).await;
    }

    async fn on_disconnect(&self, connection: &ConnectionId) {
        self.disconnect(connection).await;
    }

    async fn on_message(&self, connection: &ConnectionId, text: String) {
        self.post(connection, text).await;
    }
}
