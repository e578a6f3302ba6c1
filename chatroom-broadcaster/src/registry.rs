use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{BroadcasterError, Result};

/// Transport-supplied identifier of one live connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for a newly accepted socket.
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::new_v4()))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Chat identity assigned at connect time. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// Display label used in message records, e.g. `user3`.
    pub fn label(&self) -> String {
        format!("user{}", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps live connections to their participant ids.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, ParticipantId>,
    next_participant_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next participant id to `connection`.
    pub fn register(&mut self, connection: ConnectionId) -> ParticipantId {
        let id = ParticipantId(self.next_participant_id);
        self.next_participant_id += 1;
        self.sessions.insert(connection, id);
        id
    }

    /// Remove `connection` if present. Removing an unknown connection is a no-op.
    pub fn unregister(&mut self, connection: &ConnectionId) -> Option<ParticipantId> {
        self.sessions.remove(connection)
    }

    pub fn lookup(&self, connection: &ConnectionId) -> Result<ParticipantId> {
        self.sessions
            .get(connection)
            .copied()
            .ok_or_else(|| BroadcasterError::UnknownSession(connection.clone()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
