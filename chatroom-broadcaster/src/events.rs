use chrono::Local;
use serde::{Deserialize, Serialize};

/// Event name used for every outbound batch of chat records.
pub const MESSAGES_EVENT: &str = "messages";

/// One chat line: `(timestamp, participant label, text)`.
///
/// Serialized as a three-element JSON array in that fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct MessageRecord {
    pub timestamp: String,
    pub label: String,
    pub text: String,
}

impl MessageRecord {
    pub fn new(timestamp: impl Into<String>, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            label: label.into(),
            text: text.into(),
        }
    }

    /// Record stamped with the current local time (HH:MM:SS).
    pub fn now(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(Local::now().format("%H:%M:%S").to_string(), label, text)
    }
}

impl From<(String, String, String)> for MessageRecord {
    fn from((timestamp, label, text): (String, String, String)) -> Self {
        Self { timestamp, label, text }
    }
}

impl From<MessageRecord> for (String, String, String) {
    fn from(record: MessageRecord) -> Self {
        (record.timestamp, record.label, record.text)
    }
}

/// Frames sent from the server to chat clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Batch of records: history replay on join, or a single new post
    Messages(Vec<MessageRecord>),

    /// Handshake rejection, sent right before the server closes the stream
    Error(String),
}

impl OutboundEvent {
    /// Wrap a single record the way every live post is broadcast
    pub fn single(record: MessageRecord) -> Self {
        Self::Messages(vec![record])
    }

    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Frames sent from chat clients to the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// First frame on every connection; selects the namespace
    Connect { namespace: String },

    /// Chat text to broadcast
    Message { text: String },
}

impl InboundFrame {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_as_triple() {
        let record = MessageRecord::new("14:23:15", "user0", "Hello world");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"["14:23:15","user0","Hello world"]"#);
    }

    #[test]
    fn test_record_text_is_not_escaped() {
        let record = MessageRecord::new("00:00:00", "user3", "<b>hi</b>");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("<b>hi</b>"));
    }

    #[test]
    fn test_record_timestamp_format() {
        let record = MessageRecord::now("user1", "x");
        let parts: Vec<&str> = record.timestamp.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn test_messages_event_serialization() {
        let event = OutboundEvent::single(MessageRecord::new("10:00:00", "user2", "hey"));
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"event\":\"messages\""));
        assert!(json.contains(r#""data":[["10:00:00","user2","hey"]]"#));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_error_event_serialization() {
        let event = OutboundEvent::Error("unknown namespace".to_string());
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"event\":\"error\""));
        assert!(json.contains("\"data\":\"unknown namespace\""));
    }

    #[test]
    fn test_inbound_frames_parse() {
        let connect = InboundFrame::parse(r#"{"type":"connect","namespace":"/ws/chat"}"#).unwrap();
        assert_eq!(connect, InboundFrame::Connect { namespace: "/ws/chat".to_string() });

        let message = InboundFrame::parse("{\"type\":\"message\",\"text\":\"hi\"}\n").unwrap();
        assert_eq!(message, InboundFrame::Message { text: "hi".to_string() });

        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"type":"shout","text":"x"}"#).is_err());
    }
}
