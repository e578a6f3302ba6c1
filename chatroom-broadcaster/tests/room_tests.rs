use std::sync::Arc;

use async_trait::async_trait;
use chatroom_broadcaster::{
    BroadcastRoom, ConnectionId, MessageRecord, OutboundEvent, ParticipantId, RoomConfig,
    RoomHandler, Transport, JOIN_TEXT, LEAVE_TEXT, MESSAGES_EVENT,
};
use parking_lot::Mutex;

/// What the room asked the transport to do, in call order
#[derive(Debug, Clone, PartialEq)]
enum Emitted {
    SendTo(ConnectionId, Vec<MessageRecord>),
    Broadcast(Vec<MessageRecord>),
}

#[derive(Default)]
struct RecordingTransport {
    emitted: Mutex<Vec<Emitted>>,
}

impl RecordingTransport {
    fn take(&self) -> Vec<Emitted> {
        std::mem::take(&mut *self.emitted.lock())
    }
}

fn records(event: &OutboundEvent) -> Vec<MessageRecord> {
    match event {
        OutboundEvent::Messages(records) => records.clone(),
        OutboundEvent::Error(reason) => panic!("room emitted an error frame: {}", reason),
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_to(&self, connection: &ConnectionId, event: &OutboundEvent) {
        self.emitted
            .lock()
            .push(Emitted::SendTo(connection.clone(), records(event)));
    }

    async fn broadcast(&self, event: &OutboundEvent) {
        self.emitted.lock().push(Emitted::Broadcast(records(event)));
    }
}

fn setup(capacity: usize) -> (Arc<BroadcastRoom>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let config = RoomConfig {
        history_capacity: capacity,
        ..RoomConfig::default()
    };
    let room = Arc::new(BroadcastRoom::new(config, transport.clone()));
    (room, transport)
}

fn label_text(records: &[MessageRecord]) -> Vec<(String, String)> {
    records
        .iter()
        .map(|r| (r.label.clone(), r.text.clone()))
        .collect()
}

fn pair(label: &str, text: &str) -> (String, String) {
    (label.to_string(), text.to_string())
}

#[tokio::test]
async fn test_capacity_two_evicts_oldest() {
    let (room, _transport) = setup(2);
    let conns: Vec<ConnectionId> = ["a", "b", "c"].iter().map(|c| ConnectionId::from(*c)).collect();
    for conn in &conns {
        room.connect(conn).await;
    }

    room.post(&conns[0], "hi").await;
    room.post(&conns[1], "there").await;
    room.post(&conns[2], "world").await;

    assert_eq!(
        label_text(&room.recent_messages()),
        vec![pair("user1", "there"), pair("user2", "world")]
    );
}

#[tokio::test]
async fn test_join_leave_and_id_not_reused() {
    let (room, transport) = setup(10);
    let a = ConnectionId::from("A");

    assert_eq!(room.connect(&a).await, ParticipantId(0));
    let emitted = transport.take();
    assert_eq!(emitted.len(), 1, "empty history means no replay");
    match &emitted[0] {
        Emitted::Broadcast(records) => {
            assert_eq!(label_text(records), vec![pair("user0", JOIN_TEXT)]);
        }
        other => panic!("expected broadcast, got {:?}", other),
    }

    room.disconnect(&a).await;
    let emitted = transport.take();
    match emitted.as_slice() {
        [Emitted::Broadcast(records)] => {
            assert_eq!(label_text(records), vec![pair("user0", LEAVE_TEXT)]);
        }
        other => panic!("expected single leave broadcast, got {:?}", other),
    }
    assert_eq!(room.session_count(), 0);

    let b = ConnectionId::from("B");
    assert_eq!(room.connect(&b).await, ParticipantId(1));
}

#[tokio::test]
async fn test_new_joiner_gets_full_replay() {
    let (room, transport) = setup(10);
    let a = ConnectionId::from("A");
    let b = ConnectionId::from("B");

    room.connect(&a).await;
    for text in ["m1", "m2", "m3"] {
        room.post(&a, text).await;
    }
    transport.take();

    room.connect(&b).await;
    let emitted = transport.take();
    assert_eq!(emitted.len(), 2);

    match &emitted[0] {
        Emitted::SendTo(target, records) => {
            assert_eq!(target, &b);
            assert_eq!(
                label_text(records),
                vec![
                    pair("user0", JOIN_TEXT),
                    pair("user0", "m1"),
                    pair("user0", "m2"),
                    pair("user0", "m3"),
                ]
            );
        }
        other => panic!("expected targeted replay first, got {:?}", other),
    }

    match &emitted[1] {
        Emitted::Broadcast(records) => {
            assert_eq!(label_text(records), vec![pair("user1", JOIN_TEXT)]);
        }
        other => panic!("expected join broadcast, got {:?}", other),
    }
}

#[tokio::test]
async fn test_post_from_unknown_connection_is_dropped() {
    let (room, transport) = setup(10);
    let a = ConnectionId::from("A");
    room.connect(&a).await;
    transport.take();
    let before = room.recent_messages();

    assert!(room.post(&"never-connected".into(), "ghost").await.is_none());

    room.disconnect(&a).await;
    transport.take();
    let after_leave = room.recent_messages();
    assert!(room.post(&a, "too late").await.is_none());

    assert!(transport.take().is_empty());
    assert_eq!(room.recent_messages(), after_leave);
    assert_eq!(after_leave.len(), before.len() + 1);
    assert_eq!(room.session_count(), 0);
}

#[tokio::test]
async fn test_disconnect_unknown_connection_is_noop() {
    let (room, transport) = setup(10);
    assert_eq!(room.disconnect(&"ghost".into()).await, None);
    assert!(transport.take().is_empty());
    assert!(room.recent_messages().is_empty());
}

#[tokio::test]
async fn test_post_returns_accepted_record() {
    let (room, _transport) = setup(10);
    let a = ConnectionId::from("A");
    room.connect(&a).await;

    let record = room.post(&a, "<b>raw</b>").await.unwrap();
    assert_eq!(record.label, "user0");
    assert_eq!(record.text, "<b>raw</b>");
    assert_eq!(room.recent_messages().last(), Some(&record));
}

#[tokio::test]
async fn test_room_handler_trait_drives_room() {
    let (room, transport) = setup(10);
    let handler: Arc<dyn RoomHandler> = room.clone();
    let a = ConnectionId::from("A");

    handler.on_connect(&a).await;
    handler.on_message(&a, "via trait".to_string()).await;
    handler.on_disconnect(&a).await;

    assert_eq!(
        label_text(&room.recent_messages()),
        vec![
            pair("user0", JOIN_TEXT),
            pair("user0", "via trait"),
            pair("user0", LEAVE_TEXT),
        ]
    );
    assert_eq!(transport.take().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_are_serialized() {
    let (room, transport) = setup(1000);
    let mut conns = Vec::new();
    for i in 0..8 {
        let conn = ConnectionId(format!("c{}", i));
        room.connect(&conn).await;
        conns.push(conn);
    }
    transport.take();

    let mut tasks = Vec::new();
    for conn in conns.clone() {
        let room = Arc::clone(&room);
        tasks.push(tokio::spawn(async move {
            for n in 0..25 {
                room.post(&conn, format!("{}-{}", conn, n)).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let history = room.recent_messages();
    assert_eq!(history.len(), 8 + 8 * 25);
    assert_eq!(transport.take().len(), 8 * 25);

    // Per-connection order survives interleaving
    for conn in &conns {
        let own: Vec<String> = history
            .iter()
            .filter(|r| r.text.starts_with(&format!("{}-", conn)))
            .map(|r| r.text.clone())
            .collect();
        let expected: Vec<String> = (0..25).map(|n| format!("{}-{}", conn, n)).collect();
        assert_eq!(own, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_get_unique_ids() {
    let (room, _transport) = setup(10);
    let mut tasks = Vec::new();
    for i in 0..32 {
        let room = Arc::clone(&room);
        tasks.push(tokio::spawn(async move {
            room.connect(&ConnectionId(format!("c{}", i))).await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 32);
    assert_eq!(ids.first(), Some(&ParticipantId(0)));
    assert_eq!(ids.last(), Some(&ParticipantId(31)));
    assert_eq!(room.session_count(), 32);
}

#[test]
fn test_outbound_event_name() {
    let json = serde_json::to_value(OutboundEvent::Messages(Vec::new())).unwrap();
    assert_eq!(json["event"], MESSAGES_EVENT);
}
